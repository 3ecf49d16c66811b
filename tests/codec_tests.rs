//! Path, domain and content conversions across many inputs.

mod common;

use common::codec;
use texel::{PathPattern, Texel, TexelError, locale::default_locales};

const DOMAINS: &[&str] = &[
    "common.json.dir",
    "locales/common.json.dir",
    "a/b/c/app.yml.dir",
    "messages.yaml.name",
    "config/i18n/messages.json.name",
];

#[test]
fn test_domain_path_domain_for_every_locale() {
    let codec = codec();
    for domain in DOMAINS {
        for locale in default_locales() {
            let path = codec.domain_to_path(domain, &locale).unwrap();
            assert_eq!(codec.path_to_domain(&path).unwrap(), *domain, "path {}", path);
            assert_eq!(codec.path_info(&path).unwrap().locale, locale);
        }
    }
}

#[test]
fn test_path_domain_path() {
    let codec = codec();
    let paths = [
        "en/common.json",
        "app/locales/de/common.yml",
        "translations.fr.yaml",
        "config/app.pt.json",
    ];
    for path in paths {
        let info = codec.path_info(path).unwrap();
        let domain = codec.path_to_domain(path).unwrap();
        assert_eq!(codec.domain_to_path(&domain, &info.locale).unwrap(), path);
    }
}

#[test]
fn test_conventions() {
    let codec = codec();

    let info = codec.path_info("app/locales/de/common.yml").unwrap();
    assert_eq!(info.folder, "app/locales/");
    assert_eq!(info.name, "common");
    assert_eq!(info.ext, "yml");
    assert_eq!(info.pattern, PathPattern::LocaleInDir);

    let info = codec.path_info("translations.fr.yaml").unwrap();
    assert_eq!(info.folder, "");
    assert_eq!(info.pattern, PathPattern::LocaleInName);
}

#[test]
fn test_non_translation_files() {
    let codec = codec();
    for path in ["README.md", "package.json", "src/main.rs", "xx/common.json", "common.xx.json"] {
        assert!(!codec.is_l10n_file(path), "{}", path);
        let err = codec.path_to_domain(path).unwrap_err();
        assert!(matches!(TexelError::find(&err), Some(TexelError::UnrecognizedPath(_))));
    }
}

#[test]
fn test_generated_content_parses_back() {
    let codec = codec();
    let domain = "common.json.dir";
    let texels = vec![
        Texel::new(domain, "a.b", "de", "eins"),
        Texel::new(domain, "a.c", "de", "zwei"),
        Texel::new(domain, "d", "de", "drei"),
    ];

    for path in ["de/common.json", "de/common.yml", "de/common.yaml"] {
        let content = codec.generate_file(path, &texels).unwrap();
        let parsed: Vec<Texel> = codec
            .parse_file(path, &content)
            .unwrap()
            .into_iter()
            .map(|t| Texel {
                domain: domain.to_string(),
                ..t
            })
            .collect();
        assert_eq!(parsed, texels, "{}", path);
    }
}

#[test]
fn test_parse_yaml_with_scalars() {
    let codec = codec();

    let texels = codec
        .parse_file("en/app.yml", "count: 3\nenabled: true\nmenu:\n  - Open\n  - Close\n")
        .unwrap();

    let pairs: Vec<(&str, &str)> = texels
        .iter()
        .map(|t| (t.key.as_str(), t.value.as_deref().unwrap()))
        .collect();
    assert_eq!(
        pairs,
        vec![("count", "3"), ("enabled", "true"), ("menu.0", "Open"), ("menu.1", "Close")]
    );
    assert!(texels.iter().all(|t| t.domain == "app.yml.dir" && t.locale == "en"));
}
