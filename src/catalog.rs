//! Carrier catalog and UDL registry.
//!
//! Languages are represented as data, not subclasses: each is a list of
//! `CarrierSignature` values consumed by the generic scanner and resolver.
//! New languages are cataloged at registration time; user-defined grammars
//! land in a separate `udl:` namespace and never shadow built-ins.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::diag::CatalogError;
use crate::model::{
    AttachmentRule, CarrierKind, CarrierSignature, CollisionStrategy, ColumnRule,
};

/// Namespace prefix for user-defined languages.
pub const UDL_NAMESPACE: &str = "udl:";

static UDL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_-]*$").expect("valid regex"));

/// Catalog file header.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogManifest {
    pub manifest_name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub schema_origin: Option<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    manifest: CatalogManifest,
    #[serde(default)]
    aliases: BTreeMap<String, String>,
    entries: Vec<serde_json::Value>,
}

/// A two-character operator pair inside a UDL definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UdlOperator {
    pub name: String,
    pub open: String,
    pub close: String,
}

impl UdlOperator {
    pub fn dolphin() -> Self {
        UdlOperator {
            name: "dolphin".into(),
            open: "<:".into(),
            close: ":>".into(),
        }
    }

    pub fn walrus() -> Self {
        UdlOperator {
            name: "walrus".into(),
            open: ":=".into(),
            close: "=:".into(),
        }
    }
}

/// A user-defined carrier grammar: single-character delimiters plus optional
/// two-character operator pairs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UdlDefinition {
    pub title: String,
    #[serde(alias = "descr")]
    pub description: String,
    pub delimiter_open: String,
    pub delimiter_close: String,
    #[serde(default)]
    pub operators: Vec<UdlOperator>,
}

/// The signature table: built-in languages plus runtime UDL entries.
#[derive(Debug, Default)]
pub struct Catalog {
    languages: BTreeMap<String, Vec<CarrierSignature>>,
    aliases: BTreeMap<String, String>,
    manifest: Option<CatalogManifest>,
    load_errors: Vec<String>,
}

impl Catalog {
    pub fn empty() -> Self {
        Catalog::default()
    }

    /// The built-in language table.
    pub fn builtin() -> Self {
        let mut catalog = Catalog::empty();
        for sig in builtin_signatures() {
            catalog
                .register(sig)
                .expect("built-in catalog signature is self-consistent");
        }
        for (alias, target) in BUILTIN_ALIASES {
            catalog.aliases.insert((*alias).into(), (*target).into());
        }
        catalog
    }

    pub fn manifest(&self) -> Option<&CatalogManifest> {
        self.manifest.as_ref()
    }

    /// Entries skipped during `load`, as human-readable messages.
    pub fn load_errors(&self) -> &[String] {
        &self.load_errors
    }

    /// All registered language names (UDL entries included, namespaced).
    pub fn languages(&self) -> Vec<&str> {
        self.languages.keys().map(String::as_str).collect()
    }

    /// Insert a signature, or reject one that fails self-consistency checks.
    pub fn register(&mut self, sig: CarrierSignature) -> Result<(), CatalogError> {
        check_signature(&sig)?;
        let key = sig.language.to_lowercase();
        let variants = self.languages.entry(key).or_default();
        if variants.iter().any(|s| s.variant == sig.variant) {
            return Err(CatalogError::DuplicateSignature {
                language: sig.language,
                variant: sig.variant,
            });
        }
        debug!(language = %sig.language, variant = %sig.variant, "registered signature");
        variants.push(sig);
        // Narrowest rule first: column-positional signatures before token
        // signatures, longer open tokens before shorter.
        variants.sort_by(|a, b| {
            let pos = |s: &CarrierSignature| usize::from(s.column_rule.is_none());
            pos(a)
                .cmp(&pos(b))
                .then(b.open_token.len().cmp(&a.open_token.len()))
                .then(a.variant.cmp(&b.variant))
        });
        Ok(())
    }

    /// All variants for a language, ordered by specificity.
    pub fn lookup(&self, language: &str) -> Result<&[CarrierSignature], CatalogError> {
        let key = self.resolve_name(language);
        match self.languages.get(&key) {
            Some(variants) => Ok(variants),
            None => Err(CatalogError::UnknownLanguage {
                language: language.to_string(),
                suggestions: self.suggest(&key),
            }),
        }
    }

    /// Register a user-defined carrier grammar under the `udl:` namespace.
    pub fn register_udl(
        &mut self,
        name: &str,
        def: &UdlDefinition,
        attachment: AttachmentRule,
    ) -> Result<(), CatalogError> {
        let lower = name.to_lowercase();
        if !UDL_NAME.is_match(&lower) {
            return Err(CatalogError::BadUdlName {
                name: name.to_string(),
            });
        }
        let key = format!("{UDL_NAMESPACE}{lower}");
        if self.languages.contains_key(&key) {
            return Err(CatalogError::DuplicateUdl {
                name: name.to_string(),
            });
        }
        check_udl_delimiter(&def.delimiter_open, "delimiter_open")?;
        check_udl_delimiter(&def.delimiter_close, "delimiter_close")?;
        for op in &def.operators {
            check_udl_operator(&op.open, &op.name)?;
            check_udl_operator(&op.close, &op.name)?;
        }

        let mut sigs = vec![CarrierSignature {
            language: key.clone(),
            variant: "delimited".into(),
            open_token: def.delimiter_open.clone(),
            close_token: Some(def.delimiter_close.clone()),
            kind: CarrierKind::BlockComment,
            multiline: true,
            nestable: false,
            nest_open_token: None,
            column_rule: None,
            collision: CollisionStrategy::DisallowCloseTokenInBody,
            attachment,
        }];
        for op in &def.operators {
            sigs.push(CarrierSignature {
                language: key.clone(),
                variant: op.name.clone(),
                open_token: op.open.clone(),
                close_token: Some(op.close.clone()),
                kind: CarrierKind::BlockComment,
                multiline: true,
                nestable: false,
                nest_open_token: None,
                column_rule: None,
                collision: CollisionStrategy::DisallowCloseTokenInBody,
                attachment,
            });
        }
        for sig in sigs {
            self.register(sig)?;
        }
        Ok(())
    }

    /// Load a catalog from a declarative JSON file. Invalid entries are
    /// skipped and reported through `load_errors`; a missing file or
    /// malformed JSON is a hard error.
    pub fn load(path: &Path) -> Result<Catalog, CatalogError> {
        let text = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: CatalogFile =
            serde_json::from_str(&text).map_err(|source| CatalogError::Format {
                path: path.display().to_string(),
                source,
            })?;

        let mut catalog = Catalog::empty();
        catalog.manifest = Some(file.manifest);
        catalog.aliases = file.aliases;
        for (index, raw) in file.entries.into_iter().enumerate() {
            match serde_json::from_value::<CarrierSignature>(raw) {
                Ok(sig) => {
                    let id = format!("{}/{}", sig.language, sig.variant);
                    if let Err(err) = catalog.register(sig) {
                        warn!(entry = %id, error = %err, "skipping catalog entry");
                        catalog.load_errors.push(format!("{id}: {err}"));
                    }
                }
                Err(err) => {
                    warn!(entry = index, error = %err, "skipping malformed catalog entry");
                    catalog.load_errors.push(format!("entry {index}: {err}"));
                }
            }
        }
        Ok(catalog)
    }

    fn resolve_name(&self, language: &str) -> String {
        let lower = language.to_lowercase();
        match self.aliases.get(&lower) {
            Some(target) => target.clone(),
            None => lower,
        }
    }

    /// Near-miss names for an unknown language, closest first.
    fn suggest(&self, language: &str) -> Vec<String> {
        let mut scored: Vec<(usize, String)> = self
            .languages
            .keys()
            .chain(self.aliases.keys())
            .map(|name| (edit_distance(language, name), name.clone()))
            .filter(|(d, _)| *d <= 2)
            .collect();
        scored.sort();
        scored.dedup_by(|a, b| a.1 == b.1);
        scored.into_iter().take(3).map(|(_, name)| name).collect()
    }
}

fn check_signature(sig: &CarrierSignature) -> Result<(), CatalogError> {
    let reject = |make: fn(String, String) -> CatalogError| {
        Err(make(sig.language.clone(), sig.variant.clone()))
    };

    if sig.open_token.is_empty() {
        return reject(|language, variant| CatalogError::EmptyOpenToken { language, variant });
    }
    if sig.kind == CarrierKind::Positional {
        if sig.column_rule.is_none() {
            return reject(|language, variant| CatalogError::MissingColumnRule {
                language,
                variant,
            });
        }
    } else {
        if sig.column_rule.is_some() {
            return reject(|language, variant| CatalogError::UnexpectedColumnRule {
                language,
                variant,
            });
        }
        if (sig.multiline || sig.nestable) && sig.close_token.is_none() {
            return reject(|language, variant| CatalogError::MissingCloseToken {
                language,
                variant,
            });
        }
    }
    if sig.collision == CollisionStrategy::EqualPadding {
        let bracket_shaped = sig.open_token.ends_with('[')
            && sig.close_token.as_deref().is_some_and(|c| c.starts_with(']'));
        if !bracket_shaped {
            return reject(|language, variant| CatalogError::BadPaddingTokens {
                language,
                variant,
            });
        }
    }
    // Catalog-authoring invariant: a multiline carrier whose close token
    // equals its open token will swallow its own payload unless a collision
    // strategy guards it.
    if sig.multiline
        && !sig.nestable
        && sig.collision == CollisionStrategy::None
        && sig.close_token.as_deref() == Some(sig.open_token.as_str())
    {
        return reject(|language, variant| CatalogError::UnguardedCloseToken {
            language,
            variant,
        });
    }
    Ok(())
}

fn check_udl_delimiter(value: &str, field: &str) -> Result<(), CatalogError> {
    if value.chars().count() != 1 {
        return Err(CatalogError::BadDelimiter {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

fn check_udl_operator(value: &str, name: &str) -> Result<(), CatalogError> {
    if value.chars().count() != 2 {
        return Err(CatalogError::BadOperatorDelimiter {
            name: name.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let subst = prev[j] + usize::from(ca != cb);
            curr[j + 1] = subst.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

// -- Built-in table -----------------------------------------------------------

const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("py", "python"),
    ("python3", "python"),
    ("jl", "julia"),
    ("rs", "rust"),
    ("js", "javascript"),
    ("kt", "kotlin"),
    ("cs", "csharp"),
    ("hs", "haskell"),
    ("erl", "erlang"),
    ("ex", "elixir"),
    ("exs", "elixir"),
    ("sh", "shell"),
    ("bash", "shell"),
    ("cob", "cobol"),
    ("cbl", "cobol"),
    ("f", "fortran"),
    ("for", "fortran"),
    ("f77", "fortran"),
];

fn literal(
    language: &str,
    variant: &str,
    token: &str,
    attachment: AttachmentRule,
) -> CarrierSignature {
    CarrierSignature {
        language: language.into(),
        variant: variant.into(),
        open_token: token.into(),
        close_token: Some(token.into()),
        kind: CarrierKind::StringLiteral,
        multiline: true,
        nestable: false,
        nest_open_token: None,
        column_rule: None,
        collision: CollisionStrategy::DisallowCloseTokenInBody,
        attachment,
    }
}

fn block(
    language: &str,
    variant: &str,
    open: &str,
    close: &str,
    attachment: AttachmentRule,
) -> CarrierSignature {
    CarrierSignature {
        language: language.into(),
        variant: variant.into(),
        open_token: open.into(),
        close_token: Some(close.into()),
        kind: CarrierKind::BlockComment,
        multiline: true,
        nestable: false,
        nest_open_token: None,
        column_rule: None,
        collision: CollisionStrategy::None,
        attachment,
    }
}

fn nested_block(
    language: &str,
    variant: &str,
    open: &str,
    close: &str,
    nest_open: &str,
    attachment: AttachmentRule,
) -> CarrierSignature {
    CarrierSignature {
        nestable: true,
        nest_open_token: Some(nest_open.into()),
        collision: CollisionStrategy::NestingDepthCount,
        ..block(language, variant, open, close, attachment)
    }
}

fn run(language: &str, variant: &str, prefix: &str, attachment: AttachmentRule) -> CarrierSignature {
    CarrierSignature {
        language: language.into(),
        variant: variant.into(),
        open_token: prefix.into(),
        close_token: None,
        kind: CarrierKind::LineCommentRun,
        multiline: false,
        nestable: false,
        nest_open_token: None,
        column_rule: None,
        collision: CollisionStrategy::None,
        attachment,
    }
}

fn positional(language: &str, variant: &str, column: usize, indicator: char) -> CarrierSignature {
    CarrierSignature {
        language: language.into(),
        variant: variant.into(),
        open_token: indicator.to_string(),
        close_token: None,
        kind: CarrierKind::Positional,
        multiline: false,
        nestable: false,
        nest_open_token: None,
        column_rule: Some(ColumnRule { column, indicator }),
        collision: CollisionStrategy::None,
        attachment: AttachmentRule::PositionalConvention,
    }
}

fn attribute(
    language: &str,
    variant: &str,
    open: &str,
    close: &str,
    attachment: AttachmentRule,
) -> CarrierSignature {
    CarrierSignature {
        kind: CarrierKind::Attribute,
        collision: CollisionStrategy::DisallowCloseTokenInBody,
        ..block(language, variant, open, close, attachment)
    }
}

fn builtin_signatures() -> Vec<CarrierSignature> {
    use AttachmentRule::*;
    vec![
        literal("python", "triple_quote", "\"\"\"", EnclosingScopeFirstStatement),
        literal("python", "triple_quote_single", "'''", EnclosingScopeFirstStatement),
        literal("julia", "triple_quote", "\"\"\"", AboveTarget),
        run("rust", "line_doc", "///", NextSymbol),
        run("rust", "module_doc", "//!", EnclosingScopeFirstStatement),
        block("javascript", "jsdoc", "/**", "*/", NextSymbol),
        block("java", "javadoc", "/**", "*/", NextSymbol),
        block("kotlin", "kdoc", "/**", "*/", NextSymbol),
        run("csharp", "xml_doc", "///", NextSymbol),
        nested_block("d", "nested_doc", "/++", "+/", "/+", NextSymbol),
        block("d", "block_doc", "/**", "*/", NextSymbol),
        block("lua", "long_bracket", "--[[", "]]", AboveTarget).with_equal_padding(),
        run("lua", "ldoc", "---", NextSymbol),
        run("haskell", "haddock_line", "-- |", NextSymbol),
        nested_block("haskell", "haddock_block", "{- |", "-}", "{-", NextSymbol),
        run("erlang", "edoc", "%% @doc", NextSymbol),
        attribute("elixir", "doc_attribute", "@doc \"\"\"", "\"\"\"", NextSymbol),
        attribute(
            "elixir",
            "moduledoc_attribute",
            "@moduledoc \"\"\"",
            "\"\"\"",
            EnclosingScopeFirstStatement,
        ),
        run("shell", "hash_doc", "##", NextSymbol),
        positional("cobol", "indicator_column", 7, '*'),
        positional("fortran", "comment_column", 1, 'C'),
        block("c", "block_comment", "/*", "*/", None),
    ]
}

impl CarrierSignature {
    fn with_equal_padding(mut self) -> Self {
        self.collision = CollisionStrategy::EqualPadding;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_open_tokens_never_empty() {
        let catalog = Catalog::builtin();
        for language in catalog.languages() {
            for sig in catalog.lookup(language).unwrap() {
                assert!(!sig.open_token.is_empty(), "{language}/{}", sig.variant);
            }
        }
    }

    #[test]
    fn register_rejects_empty_open_token() {
        let mut catalog = Catalog::empty();
        let mut sig = literal("x", "v", "\"\"\"", AttachmentRule::NextSymbol);
        sig.open_token.clear();
        assert!(matches!(
            catalog.register(sig),
            Err(CatalogError::EmptyOpenToken { .. })
        ));
    }

    #[test]
    fn register_rejects_unguarded_identical_delimiters() {
        let mut catalog = Catalog::empty();
        let mut sig = literal("x", "v", "\"\"\"", AttachmentRule::NextSymbol);
        sig.collision = CollisionStrategy::None;
        assert!(matches!(
            catalog.register(sig),
            Err(CatalogError::UnguardedCloseToken { .. })
        ));
    }

    #[test]
    fn register_rejects_positional_without_column_rule() {
        let mut catalog = Catalog::empty();
        let mut sig = positional("x", "v", 7, '*');
        sig.column_rule = None;
        assert!(matches!(
            catalog.register(sig),
            Err(CatalogError::MissingColumnRule { .. })
        ));
    }

    #[test]
    fn register_rejects_duplicate_variant() {
        let mut catalog = Catalog::empty();
        catalog
            .register(run("x", "v", "//", AttachmentRule::NextSymbol))
            .unwrap();
        assert!(matches!(
            catalog.register(run("x", "v", "///", AttachmentRule::NextSymbol)),
            Err(CatalogError::DuplicateSignature { .. })
        ));
    }

    #[test]
    fn lookup_orders_positional_before_token() {
        let mut catalog = Catalog::empty();
        catalog
            .register(run("cobolish", "star_comment", "*", AttachmentRule::NextSymbol))
            .unwrap();
        catalog
            .register(positional("cobolish", "indicator_column", 7, '*'))
            .unwrap();
        let sigs = catalog.lookup("cobolish").unwrap();
        assert_eq!(sigs[0].variant, "indicator_column");
    }

    #[test]
    fn lookup_orders_longer_open_tokens_first() {
        let sigs = Catalog::builtin().lookup("lua").unwrap().to_vec();
        let long = sigs.iter().position(|s| s.variant == "long_bracket").unwrap();
        let ldoc = sigs.iter().position(|s| s.variant == "ldoc").unwrap();
        assert!(long < ldoc);
    }

    #[test]
    fn lookup_resolves_aliases_case_insensitively() {
        let catalog = Catalog::builtin();
        assert!(catalog.lookup("Py").is_ok());
        assert!(catalog.lookup("PYTHON").is_ok());
        assert!(catalog.lookup("f77").is_ok());
    }

    #[test]
    fn unknown_language_suggests_near_misses() {
        let err = Catalog::builtin().lookup("pythn").unwrap_err();
        match err {
            CatalogError::UnknownLanguage { suggestions, .. } => {
                assert!(suggestions.contains(&"python".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn udl_rejects_unusable_names() {
        let mut catalog = Catalog::builtin();
        let def = UdlDefinition {
            title: "bad".into(),
            description: "bad name".into(),
            delimiter_open: "!".into(),
            delimiter_close: "!".into(),
            operators: vec![],
        };
        assert!(matches!(
            catalog.register_udl("my lang", &def, AttachmentRule::NextSymbol),
            Err(CatalogError::BadUdlName { .. })
        ));
    }

    #[test]
    fn udl_rejects_two_character_delimiter() {
        let mut catalog = Catalog::builtin();
        let def = UdlDefinition {
            title: "bad".into(),
            description: "two-char delimiter".into(),
            delimiter_open: "!!".into(),
            delimiter_close: "!".into(),
            operators: vec![],
        };
        assert!(matches!(
            catalog.register_udl("bad", &def, AttachmentRule::NextSymbol),
            Err(CatalogError::BadDelimiter { .. })
        ));
    }

    #[test]
    fn udl_rejects_one_character_operator() {
        let mut catalog = Catalog::builtin();
        let def = UdlDefinition {
            title: "bad".into(),
            description: "one-char operator".into(),
            delimiter_open: "!".into(),
            delimiter_close: "!".into(),
            operators: vec![UdlOperator {
                name: "stub".into(),
                open: "<".into(),
                close: ">".into(),
            }],
        };
        assert!(matches!(
            catalog.register_udl("bad", &def, AttachmentRule::NextSymbol),
            Err(CatalogError::BadOperatorDelimiter { .. })
        ));
    }

    #[test]
    fn udl_registers_dolphin_and_walrus_operators() {
        let mut catalog = Catalog::builtin();
        let def = UdlDefinition {
            title: "notation".into(),
            description: "custom docs".into(),
            delimiter_open: "!".into(),
            delimiter_close: "!".into(),
            operators: vec![UdlOperator::dolphin(), UdlOperator::walrus()],
        };
        catalog
            .register_udl("notation", &def, AttachmentRule::NextSymbol)
            .unwrap();
        let sigs = catalog.lookup("udl:notation").unwrap();
        assert_eq!(sigs.len(), 3);
        assert!(sigs.iter().any(|s| s.variant == "dolphin" && s.open_token == "<:"));
        assert!(sigs.iter().any(|s| s.variant == "walrus" && s.close_token.as_deref() == Some("=:")));
        // Built-ins are untouched.
        assert!(catalog.lookup("python").is_ok());
    }

    #[test]
    fn udl_name_collision_rejected() {
        let mut catalog = Catalog::builtin();
        let def = UdlDefinition {
            title: "n".into(),
            description: "d".into(),
            delimiter_open: "!".into(),
            delimiter_close: "!".into(),
            operators: vec![],
        };
        catalog
            .register_udl("twice", &def, AttachmentRule::NextSymbol)
            .unwrap();
        assert!(matches!(
            catalog.register_udl("twice", &def, AttachmentRule::NextSymbol),
            Err(CatalogError::DuplicateUdl { .. })
        ));
    }

    #[test]
    fn load_skips_invalid_entries_and_keeps_valid_ones() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r###"{{
                "manifest": {{"manifest_name": "test catalog", "schema_origin": "unit test"}},
                "aliases": {{"pyish": "mini"}},
                "entries": [
                    {{
                        "language": "mini",
                        "variant": "doc",
                        "open_token": "##",
                        "kind": "line_comment_run",
                        "multiline": false,
                        "attachment": "next_symbol"
                    }},
                    {{
                        "language": "mini",
                        "variant": "broken",
                        "open_token": "",
                        "kind": "line_comment_run",
                        "multiline": false,
                        "attachment": "next_symbol"
                    }}
                ]
            }}"###
        )
        .unwrap();

        let catalog = Catalog::load(file.path()).unwrap();
        assert_eq!(catalog.lookup("pyish").unwrap().len(), 1);
        assert_eq!(catalog.load_errors().len(), 1);
        assert!(catalog.load_errors()[0].contains("mini/broken"));
        assert_eq!(catalog.manifest().unwrap().manifest_name, "test catalog");
        assert_eq!(catalog.manifest().unwrap().version, "1.0.0");
    }

    #[test]
    fn load_missing_file_is_hard_error() {
        let err = Catalog::load(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance("python", "python"), 0);
        assert_eq!(edit_distance("pythn", "python"), 1);
        assert_eq!(edit_distance("rust", "lua"), 4);
    }
}
