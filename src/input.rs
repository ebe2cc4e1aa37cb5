use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Reads the account-identifier list from a file.
///
/// One identifier per line; blank lines and `#` comments are skipped,
/// surrounding quote characters are stripped and whitespace trimmed.
pub fn read_accounts(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read accounts file: {}", path.display()))?;

    Ok(content
        .lines()
        .map(|line| line.replace('"', "").replace('\'', "").trim().to_string())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_skips_comments_and_blanks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "\"H6ahDptbaMtEp2Kk4CBVqHbUbZTj7WSxyPP5Yc8C7ngY\"").unwrap();
        writeln!(file, "# a comment").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  'AnotherAccountHash'  ").unwrap();

        let accounts = read_accounts(file.path()).unwrap();
        assert_eq!(
            accounts,
            vec![
                "H6ahDptbaMtEp2Kk4CBVqHbUbZTj7WSxyPP5Yc8C7ngY".to_string(),
                "AnotherAccountHash".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(read_accounts(Path::new("/no/such/accounts.txt")).is_err());
    }
}
