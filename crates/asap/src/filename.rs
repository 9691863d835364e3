//! File name helpers: format detection by extension.

/// Split `filename` into the base name without extension and the extension.
///
/// Both `/` and `\` separate directories. Returns `None` when the base name
/// has no dot.
#[must_use]
pub fn split(filename: &str) -> Option<(&str, &str)> {
    let base_start = filename.rfind(['/', '\\']).map_or(0, |i| i + 1);
    let base = &filename[base_start..];
    let dot = base.rfind('.')?;
    Some((&base[..dot], &base[dot + 1..]))
}

/// Whether `ext` (without the dot) names a supported format.
#[must_use]
pub fn is_our_ext(ext: &str) -> bool {
    ext.eq_ignore_ascii_case("sap")
}

/// Whether `filename` has a supported extension.
#[must_use]
pub fn is_our_file(filename: &str) -> bool {
    split(filename).is_some_and(|(_, ext)| is_our_ext(ext))
}

/// Whether [`crate::set_module_info`] can rewrite this file's metadata.
#[must_use]
pub fn can_set_module_info(filename: &str) -> bool {
    is_our_file(filename)
}

/// Replace the extension of `filename`, or `None` if it has none.
#[must_use]
pub fn change_ext(filename: &str, ext: &str) -> Option<String> {
    let (_, old) = split(filename)?;
    let stem_end = filename.len() - old.len();
    Some(format!("{}{ext}", &filename[..stem_end]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_base_name() {
        assert_eq!(split("music/Lasermania.sap"), Some(("Lasermania", "sap")));
        assert_eq!(
            split(r"C:\asma\Games\Drop.Zone.SAP"),
            Some(("Drop.Zone", "SAP"))
        );
        assert_eq!(split("dir.d/noext"), None);
    }

    #[test]
    fn recognises_sap_case_insensitively() {
        assert!(is_our_file("a.sap"));
        assert!(is_our_file("A.SaP"));
        assert!(!is_our_file("a.cmc"));
        assert!(!is_our_file("sap"));
        assert!(is_our_ext("SAP"));
        assert!(!is_our_ext("sapx"));
        assert!(can_set_module_info("x/y.sap"));
        assert!(!can_set_module_info("x/y.rmt"));
    }

    #[test]
    fn changes_extension() {
        assert_eq!(
            change_ext("out/tune.sap", "wav").as_deref(),
            Some("out/tune.wav")
        );
        assert_eq!(change_ext("a.b/tune", "wav"), None);
    }
}
