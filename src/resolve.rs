//! Template identifier to file path resolution.

use std::path::{Path, PathBuf};

use crate::views::RenderOptions;

/// Map a template identifier to the file the engine should load.
///
/// - An absolute identifier that already carries the default extension is
///   returned unchanged.
/// - With a templates directory, an identifier carrying the extension is
///   joined onto it; otherwise the extension is appended first.
/// - Without a templates directory the identifier is returned as is and the
///   engine's own lookup applies.
pub fn resolve_template(identifier: &str, options: &RenderOptions) -> PathBuf {
    let extension = options.default_extension.as_str();
    let has_extension = identifier.ends_with(extension);
    let path = Path::new(identifier);

    if path.is_absolute() && has_extension {
        return path.to_path_buf();
    }

    match options.base_dir() {
        Some(dir) if has_extension => dir.join(identifier),
        Some(dir) => dir.join(format!("{identifier}{extension}")),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(templates_dir: Option<&str>) -> RenderOptions {
        RenderOptions {
            templates_dir: templates_dir.map(PathBuf::from),
            default_extension: ".jinja".to_string(),
            ..RenderOptions::default()
        }
    }

    #[test]
    fn test_appends_extension_under_templates_dir() {
        let opts = options(Some("/tpl"));
        assert_eq!(
            resolve_template("hello", &opts),
            PathBuf::from("/tpl/hello.jinja")
        );
        assert_eq!(
            resolve_template("valid/test", &opts),
            PathBuf::from("/tpl/valid/test.jinja")
        );
    }

    #[test]
    fn test_keeps_existing_extension() {
        let opts = options(Some("/tpl"));
        assert_eq!(
            resolve_template("hello.jinja", &opts),
            PathBuf::from("/tpl/hello.jinja")
        );
    }

    #[test]
    fn test_absolute_with_extension_is_unchanged() {
        let opts = options(Some("/tpl"));
        assert_eq!(
            resolve_template("/elsewhere/page.jinja", &opts),
            PathBuf::from("/elsewhere/page.jinja")
        );
    }

    #[test]
    fn test_without_templates_dir_is_unchanged() {
        let opts = options(None);
        assert_eq!(resolve_template("hello", &opts), PathBuf::from("hello"));
        assert_eq!(
            resolve_template("pages/a.jinja", &opts),
            PathBuf::from("pages/a.jinja")
        );
    }

    #[test]
    fn test_relative_to_prefixes_templates_dir() {
        let mut opts = options(Some("views"));
        opts.relative_to = Some(PathBuf::from("/srv/app"));
        assert_eq!(
            resolve_template("hello", &opts),
            PathBuf::from("/srv/app/views/hello.jinja")
        );
    }

    #[test]
    fn test_resolve_is_idempotent_for_absolute_results() {
        let opts = options(Some("/tpl"));
        for id in ["hello", "a/b/c", "x.jinja", "/abs/y.jinja"] {
            let once = resolve_template(id, &opts);
            let twice = resolve_template(once.to_str().unwrap(), &opts);
            assert_eq!(once, twice, "identifier {id}");
        }
    }

    #[test]
    fn test_custom_extension() {
        let mut opts = options(Some("/tpl"));
        opts.default_extension = ".html".to_string();
        assert_eq!(
            resolve_template("hello", &opts),
            PathBuf::from("/tpl/hello.html")
        );
        assert_eq!(
            resolve_template("hello.jinja", &opts),
            PathBuf::from("/tpl/hello.jinja.html")
        );
    }
}
