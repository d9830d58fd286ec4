//! Accent-insensitive file name search.

use camino::{Utf8Path, Utf8PathBuf};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;
use walkdir::WalkDir;

/// Normalize `text` for matching: NFKD with combining marks stripped, then
/// lower-cased, with the dotless Turkish `ı` folded to `i`.
pub fn fold(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c == 'ı' { 'i' } else { c })
        .collect()
}

/// Whether `file_name` matches an already folded query.
fn name_matches(folded_query: &str, file_name: &str) -> bool {
    let name = fold(file_name);
    name.contains(folded_query) || folded_query.contains(name.as_str())
}

/// Files under `root` (recursively) whose names match `query`.
///
/// A name matches when the folded query is contained in the folded name, or
/// the folded name in the folded query. Unreadable entries are skipped.
pub fn search_files(root: &Utf8Path, query: &str) -> Vec<Utf8PathBuf> {
    let query = fold(query.trim());
    if query.is_empty() {
        return Vec::new();
    }

    let mut results: Vec<Utf8PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.into_path()).ok())
        .filter(|path| path.file_name().is_some_and(|name| name_matches(&query, name)))
        .collect();

    results.sort();
    tracing::debug!("Search for {:?} under {}: {} hit(s)", query, root, results.len());
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_fold_turkish() {
        assert_eq!(fold("IŞIK"), "isik");
        assert_eq!(fold("İstanbul"), "istanbul");
        assert_eq!(fold("ağaç"), "agac");
        assert_eq!(fold("Gözlük"), "gozluk");
    }

    #[test]
    fn test_fold_latin_accents() {
        assert_eq!(fold("Résumé"), "resume");
        assert_eq!(fold("Ñandú"), "nandu");
        assert_eq!(fold("plain.txt"), "plain.txt");
    }

    #[test]
    fn test_fold_compatibility_forms() {
        assert_eq!(fold("\u{FB01}le.txt"), "file.txt");
        assert_eq!(fold("Ｒｅｐｏｒｔ"), "report");
    }

    #[test]
    fn test_decomposed_name_matches() {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        let decomposed = "O\u{308}zgec\u{327}mis\u{327}.pdf";
        fs::write(root.join(decomposed), "cv").unwrap();

        assert_eq!(fold(decomposed), "ozgecmis.pdf");
        assert_eq!(search_files(&root, "özgeçmiş"), vec![root.join(decomposed)]);
        assert_eq!(search_files(&root, "OZGECMIS"), vec![root.join(decomposed)]);
    }

    #[test]
    fn test_search_recursive() {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        fs::create_dir_all(root.join("Documents")).unwrap();
        fs::write(root.join("Documents").join("Özgeçmiş.pdf"), "cv").unwrap();
        fs::write(root.join("notes.txt"), "n").unwrap();

        let hits = search_files(&root, "ozgecmis");
        assert_eq!(hits, vec![root.join("Documents").join("Özgeçmiş.pdf")]);

        assert!(search_files(&root, "   ").is_empty());
        assert!(search_files(&root, "missing").is_empty());
    }

    #[test]
    fn test_name_inside_query_matches() {
        assert!(name_matches(&fold("notes.txt backup"), "notes.txt"));
        assert!(!name_matches(&fold("report"), "notes.txt"));
    }
}
