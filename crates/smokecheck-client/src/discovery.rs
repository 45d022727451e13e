use std::path::{Path, PathBuf};

/// Well-known Chrome/Chromium locations, checked in order.
const CHROME_CANDIDATES: &[&str] = &[
    // Snap (Ubuntu default)
    "/snap/chromium/current/usr/lib/chromium-browser/chrome",
    // Flatpak
    "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
    // Common apt / manual installs
    "/usr/bin/google-chrome-stable",
    "/usr/bin/google-chrome",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
];

/// Tries to locate the real Chrome/Chromium binary.
///
/// On systems where Chromium is installed via **snap**, the wrapper at
/// `/snap/bin/chromium` strips unknown CLI flags, breaking headless mode.
/// We look for the real binary inside the snap first, then fall back to
/// well-known system paths. `CHROME_BIN` overrides everything. If nothing is
/// found we return `None` and let the driver do its own lookup.
pub fn find_chrome_binary() -> Option<PathBuf> {
    find_chrome_binary_in(std::env::var("CHROME_BIN").ok(), CHROME_CANDIDATES)
}

fn find_chrome_binary_in(env_override: Option<String>, candidates: &[&str]) -> Option<PathBuf> {
    if let Some(p) = env_override {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}

/// Looks for a `chromedriver` (or `chromedriver.exe`) binary in `dir`.
pub fn find_local_chromedriver(dir: &Path) -> Option<PathBuf> {
    ["chromedriver", "chromedriver.exe"]
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("my-chrome");
        std::fs::write(&bin, b"").unwrap();

        let found = find_chrome_binary_in(Some(bin.display().to_string()), &["/nonexistent/chrome"]);
        assert_eq!(found, Some(bin));
    }

    #[test]
    fn missing_override_falls_back_to_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("chromium");
        std::fs::write(&bin, b"").unwrap();
        let candidate = bin.display().to_string();

        let found = find_chrome_binary_in(Some("/nonexistent/override".into()), &[candidate.as_str()]);
        assert_eq!(found, Some(bin));
    }

    #[test]
    fn nothing_found_returns_none() {
        assert!(find_chrome_binary_in(None, &["/nonexistent/a", "/nonexistent/b"]).is_none());
    }

    #[test]
    fn finds_chromedriver_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_local_chromedriver(dir.path()).is_none());

        let exe = dir.path().join("chromedriver.exe");
        std::fs::write(&exe, b"").unwrap();
        assert_eq!(find_local_chromedriver(dir.path()), Some(exe));

        let unix = dir.path().join("chromedriver");
        std::fs::write(&unix, b"").unwrap();
        assert_eq!(find_local_chromedriver(dir.path()), Some(unix));
    }
}
