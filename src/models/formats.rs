use std::path::{Path, PathBuf};

/// 可选的输入格式
pub const INPUT_FORMATS: &[&str] = &[
    "csv",
    "docx",
    "odt",
    "html",
    "commonmark",
    "markdown",
    "mediawiki",
    "latex",
];

/// 可选的输出格式（csv 只能作为输入）
pub const OUTPUT_FORMATS: &[&str] = &[
    "docx",
    "odt",
    "html",
    "commonmark",
    "markdown",
    "mediawiki",
    "latex",
];

/// 输出格式 -> 文件扩展名
const FORMAT_EXTENSIONS: &[(&str, &str)] = &[
    ("docx", "docx"),
    ("odt", "odt"),
    ("html", "html"),
    ("commonmark", "md"),
    ("markdown", "md"),
    ("mediawiki", "wiki"),
    ("latex", "tex"),
];

pub fn is_input_format(format: &str) -> bool {
    INPUT_FORMATS.contains(&format)
}

pub fn is_output_format(format: &str) -> bool {
    OUTPUT_FORMATS.contains(&format)
}

/// 查找输出格式对应的扩展名（不带点）
pub fn extension_for(format: &str) -> Option<&'static str> {
    FORMAT_EXTENSIONS
        .iter()
        .find(|(name, _)| *name == format)
        .map(|(_, ext)| *ext)
}

/// 根据输入路径和输出格式生成输出路径
///
/// 只替换最后一个扩展名：`x.tar.gz` + html -> `x.tar.html`
pub fn derive_output_path(input: &Path, output_format: &str) -> Option<PathBuf> {
    let ext = extension_for(output_format)?;
    Some(input.with_extension(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_output_format_has_an_extension() {
        for format in OUTPUT_FORMATS {
            assert!(extension_for(format).is_some(), "missing extension for {}", format);
        }
    }

    #[test]
    fn csv_is_input_only() {
        assert!(is_input_format("csv"));
        assert!(!is_output_format("csv"));
        assert_eq!(extension_for("csv"), None);
    }

    #[test]
    fn replaces_only_final_extension() {
        assert_eq!(
            derive_output_path(Path::new("report.docx"), "markdown"),
            Some(PathBuf::from("report.md"))
        );
        assert_eq!(
            derive_output_path(Path::new("x.tar.gz"), "html"),
            Some(PathBuf::from("x.tar.html"))
        );
        assert_eq!(
            derive_output_path(Path::new("/docs/notes"), "latex"),
            Some(PathBuf::from("/docs/notes.tex"))
        );
    }

    #[test]
    fn commonmark_and_markdown_share_md() {
        assert_eq!(extension_for("commonmark"), Some("md"));
        assert_eq!(extension_for("markdown"), Some("md"));
        assert_eq!(extension_for("mediawiki"), Some("wiki"));
    }
}
