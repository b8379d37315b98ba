//! Client fingerprinting from the raw `User-Agent` string.
//!
//! The device class is one third of the session fingerprint (device, IP,
//! user agent). OS and browser detection are informational only: they feed
//! the login-notice email and the session listing, never an authorization
//! decision.

/// Coarse device class derived from the user agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DeviceClass {
    Mobile,
    Tablet,
    Bot,
    Desktop,
}

impl DeviceClass {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Mobile => "Mobile",
            Self::Tablet => "Tablet",
            Self::Bot => "Bot",
            Self::Desktop => "Desktop",
        }
    }
}

/// Classify a user agent by substring match.
///
/// Priority order matters: mobile before tablet before bot, anything else is
/// a desktop.
pub(crate) fn classify_device(user_agent: &str) -> DeviceClass {
    let ua = user_agent.to_lowercase();

    if ua.contains("mobile") {
        DeviceClass::Mobile
    } else if ua.contains("tablet") {
        DeviceClass::Tablet
    } else if ua.contains("bot") {
        DeviceClass::Bot
    } else {
        DeviceClass::Desktop
    }
}

/// Session records store the lowercased class as the fingerprint component.
pub(crate) fn device_fingerprint(user_agent: &str) -> String {
    classify_device(user_agent).as_str().to_lowercase()
}

const OS_SIGNATURES: &[(&str, &str)] = &[
    ("Windows", "windows"),
    ("Linux", "linux"),
    ("macOS", "macintosh"),
    ("macOS", "mac os"),
    ("Android", "android"),
    ("MIUI (Xiaomi)", "xiaomi"),
    ("HyperOS", "hyperos"),
    ("iOS", "iphone"),
    ("iOS", "ipad"),
    ("iOS", "ipod"),
];

const BROWSER_SIGNATURES: &[(&str, &str)] = &[
    ("Chrome", "chrome/"),
    ("Safari", "version/"),
    ("Firefox", "firefox/"),
    ("Opera", "opr/"),
    ("Edge", "edge/"),
    ("Brave", "brave/"),
    ("DuckDuckGo", "duckduckgo/"),
    ("Tor", "tor/"),
    ("Internet Explorer", "msie"),
    ("Internet Explorer", "trident"),
];

/// Best-effort OS detection, first signature wins.
pub(crate) fn detect_os(user_agent: &str) -> String {
    detect(user_agent, OS_SIGNATURES).unwrap_or_else(|| "Unknown OS".to_string())
}

/// Best-effort browser detection, first signature wins.
pub(crate) fn detect_browser(user_agent: &str) -> String {
    detect(user_agent, BROWSER_SIGNATURES).unwrap_or_else(|| "Unknown Browser".to_string())
}

fn detect(user_agent: &str, signatures: &[(&str, &str)]) -> Option<String> {
    let ua = user_agent.to_lowercase();

    for (name, search) in signatures {
        let Some(position) = ua.find(search) else {
            continue;
        };

        // Version digits (and dots) following the signature, if any.
        let version: String = ua[position + search.len()..]
            .trim_start_matches([' ', '/'])
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();

        if version.is_empty() {
            return Some((*name).to_string());
        }

        return Some(format!("{name} {version}"));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESKTOP_CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
         AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    #[test]
    fn mobile_beats_tablet_and_bot() {
        assert_eq!(
            classify_device("SomeAgent Mobile Tablet bot"),
            DeviceClass::Mobile
        );
        assert_eq!(classify_device("Tablet bot"), DeviceClass::Tablet);
        assert_eq!(classify_device("Googlebot/2.1"), DeviceClass::Bot);
        assert_eq!(classify_device(DESKTOP_CHROME), DeviceClass::Desktop);
    }

    #[test]
    fn classify_is_case_insensitive() {
        assert_eq!(classify_device("ANDROID MOBILE"), DeviceClass::Mobile);
    }

    #[test]
    fn fingerprint_is_lowercase() {
        assert_eq!(device_fingerprint(DESKTOP_CHROME), "desktop");
        assert_eq!(device_fingerprint("x mobile x"), "mobile");
    }

    #[test]
    fn detect_os_with_version() {
        assert_eq!(detect_os("Linux; Android 14; Pixel 8"), "Linux");
        assert_eq!(detect_os("Android 14; Pixel 8"), "Android 14");
        assert_eq!(detect_os(DESKTOP_CHROME), "Windows");
    }

    #[test]
    fn detect_os_unknown() {
        assert_eq!(detect_os("CERN-LineMode/2.15"), "Unknown OS");
    }

    #[test]
    fn detect_browser_with_version() {
        assert_eq!(detect_browser(DESKTOP_CHROME), "Chrome 120.0.0.0");
        assert_eq!(detect_browser("Gecko/20100101 Firefox/121.0"), "Firefox 121.0");
    }

    #[test]
    fn detect_browser_unknown() {
        assert_eq!(detect_browser("curl"), "Unknown Browser");
    }

    #[test]
    fn detect_browser_without_version_digits() {
        assert_eq!(detect_browser("Windows; trident; rv:11"), "Internet Explorer");
    }
}
