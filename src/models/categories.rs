use indexmap::IndexMap;
use std::collections::HashMap;

/// Catch-all category for unknown or missing extensions.
pub const FALLBACK_CATEGORY: &str = "Others";

/// Ordered category table with a derived extension index.
///
/// Built once at startup; lookups are case-insensitive on the extension.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    categories: IndexMap<String, Vec<String>>,
    extension_index: HashMap<String, String>,
}

impl CategoryTable {
    /// Build a table from an ordered category → extensions mapping.
    ///
    /// When an extension appears under two categories the first one wins.
    /// The fallback category is always present.
    pub fn new(mut categories: IndexMap<String, Vec<String>>) -> Self {
        if !categories.contains_key(FALLBACK_CATEGORY) {
            categories.insert(FALLBACK_CATEGORY.to_string(), Vec::new());
        }

        let mut extension_index = HashMap::new();
        for (category, extensions) in &categories {
            for ext in extensions {
                extension_index
                    .entry(ext.to_lowercase())
                    .or_insert_with(|| category.clone());
            }
        }

        Self {
            categories,
            extension_index,
        }
    }

    /// Category for an already lower-cased extension.
    pub fn category_for(&self, extension: &str) -> &str {
        self.extension_index
            .get(extension)
            .map(String::as_str)
            .unwrap_or(FALLBACK_CATEGORY)
    }

    /// Category for a file name, by the text after its last dot.
    pub fn category_for_file_name(&self, file_name: &str) -> &str {
        self.category_for(&extension_of(file_name))
    }

    /// Category names in table order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    pub fn extensions(&self, category: &str) -> Option<&[String]> {
        self.categories.get(category).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl Default for CategoryTable {
    /// The built-in table.
    fn default() -> Self {
        let table: [(&str, &[&str]); 7] = [
            ("Setups", &["exe", "msi"]),
            (
                "Documents",
                &["pdf", "docx", "doc", "pptx", "ppt", "xlsx", "xls", "txt"],
            ),
            ("Images", &["jpg", "jpeg", "png", "gif", "bmp", "tiff"]),
            ("Videos", &["mp4", "mkv", "avi", "mov", "flv", "wmv", "3gp"]),
            ("Music", &["mp3", "wav", "flac", "aac", "ogg", "wma"]),
            ("Compressed", &["zip", "rar", "7z", "tar", "gz", "iso"]),
            (FALLBACK_CATEGORY, &[]),
        ];

        let categories = table
            .iter()
            .map(|(name, exts)| {
                (
                    name.to_string(),
                    exts.iter().map(|e| e.to_string()).collect(),
                )
            })
            .collect();

        Self::new(categories)
    }
}

/// Lower-cased text after the last `.` of a file name; empty when there is
/// no dot.
pub fn extension_of(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_builtin_table_order() {
        let table = CategoryTable::default();
        let names: Vec<&str> = table.names().collect();
        assert_eq!(
            names,
            vec![
                "Setups",
                "Documents",
                "Images",
                "Videos",
                "Music",
                "Compressed",
                "Others"
            ]
        );
    }

    #[test]
    fn test_category_lookup() {
        let table = CategoryTable::default();
        assert_eq!(table.category_for_file_name("report.PDF"), "Documents");
        assert_eq!(table.category_for_file_name("setup.msi"), "Setups");
        assert_eq!(table.category_for_file_name("clip.3gp"), "Videos");
        assert_eq!(table.category_for_file_name("backup.tar.gz"), "Compressed");
        assert_eq!(table.category_for_file_name("notes.unknown"), "Others");
        assert_eq!(table.category_for_file_name("Makefile"), "Others");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("photo.JPG"), "jpg");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of(".bashrc"), "bashrc");
        assert_eq!(extension_of("trailing."), "");
    }

    #[test]
    fn test_fallback_always_present() {
        let mut categories = IndexMap::new();
        categories.insert("Code".to_string(), vec!["RS".to_string()]);
        let table = CategoryTable::new(categories);

        assert!(table.contains(FALLBACK_CATEGORY));
        assert_eq!(table.category_for("rs"), "Code");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_first_category_wins_on_duplicate_extension() {
        let mut categories = IndexMap::new();
        categories.insert("A".to_string(), vec!["dat".to_string()]);
        categories.insert("B".to_string(), vec!["dat".to_string()]);
        let table = CategoryTable::new(categories);

        assert_eq!(table.category_for("dat"), "A");
    }

    proptest! {
        #[test]
        fn prop_extension_is_lowercase_and_dotless(name in "[A-Za-z0-9._-]{0,24}") {
            let ext = extension_of(&name);
            prop_assert!(!ext.contains('.'));
            prop_assert_eq!(ext.clone(), ext.to_lowercase());
        }

        #[test]
        fn prop_every_name_has_a_known_category(name in "\\PC{0,24}") {
            let table = CategoryTable::default();
            let category = table.category_for_file_name(&name);
            prop_assert!(table.contains(category));
        }
    }
}
