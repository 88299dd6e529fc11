//! Identifier rules shared by inference and insertion.
//!
//! Everything here is a pure function over immutable tables built once, so
//! both engines derive identical table and column names from the same input.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};

lazy_static! {
    static ref REPEATED_UNDERSCORES: Regex = Regex::new(r"_+").unwrap();

    static ref RESERVED_WORDS: HashSet<&'static str> = [
        "select", "from", "where", "table", "index", "order", "group", "by",
        "insert", "update", "delete", "create", "drop", "alter", "join",
        "union", "values", "primary", "key", "references", "default", "check",
        "limit", "offset", "transaction", "column", "having", "as", "on", "in",
        "not", "null", "and", "or", "is", "case", "when", "then", "else", "end",
        "exists", "distinct", "all", "into", "set", "view", "trigger", "pragma",
    ]
    .into_iter()
    .collect();

    /// Words whose trailing `s` is part of the singular form.
    static ref SINGULAR_EXCEPTIONS: HashSet<&'static str> = [
        "series", "species", "news", "status", "analysis", "basis", "axis",
        "mass", "class", "bias", "gas", "chassis", "diagnosis", "synopsis",
        "thesis", "process", "address", "access", "genus", "virus", "locus",
        "nucleus", "focus", "radius", "corpus", "apparatus", "consensus",
    ]
    .into_iter()
    .collect();

    /// Field names that refer to a table without matching its name.
    static ref FIELD_ALIASES: HashMap<&'static str, &'static [&'static str]> = {
        let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        m.insert("entry", &["rcsb_entry", "pdb_entry", "structure"]);
        m.insert("polymer_entity", &["entity_poly", "rcsb_polymer_entity", "polymer"]);
        m.insert("nonpolymer_entity", &["nonpolymer_comp", "rcsb_nonpolymer_entity", "ligand"]);
        m.insert("branched_entity", &["entity_branch", "rcsb_branched_entity"]);
        m.insert("assembly", &["pdbx_struct_assembly", "rcsb_assembly_info"]);
        m.insert("chem_comp", &["chemical_component", "component"]);
        m.insert("citation", &["primary_citation", "rcsb_primary_citation"]);
        m.insert("organism", &["source_organism", "rcsb_entity_source_organism"]);
        m.insert("uniprot", &["uniprots", "rcsb_uniprot_protein"]);
        m
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentKind {
    Table,
    Column,
}

impl IdentKind {
    fn prefix(self) -> &'static str {
        match self {
            IdentKind::Table => "table_",
            IdentKind::Column => "col_",
        }
    }

    fn reserved_suffix(self) -> &'static str {
        match self {
            IdentKind::Table => "_tbl",
            IdentKind::Column => "_col",
        }
    }
}

pub fn is_reserved(word: &str) -> bool {
    RESERVED_WORDS.contains(word.to_ascii_lowercase().as_str())
}

/// Turns any string into a safe lowercase `[a-z0-9_]` identifier.
pub fn sanitize_identifier(raw: &str, kind: IdentKind) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let collapsed = REPEATED_UNDERSCORES.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches('_');

    let mut name = if trimmed.is_empty() || trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{}{}", kind.prefix(), trimmed)
    } else {
        trimmed.to_string()
    };
    name.make_ascii_lowercase();

    if is_reserved(&name) {
        name.push_str(kind.reserved_suffix());
    }
    name
}

pub fn sanitize_table_name(raw: &str) -> String {
    sanitize_identifier(raw, IdentKind::Table)
}

pub fn sanitize_column_name(raw: &str) -> String {
    sanitize_identifier(raw, IdentKind::Column)
}

/// `polymerEntities` -> `polymer_entities`, `CoreEntry` -> `core_entry`.
pub fn to_snake_case(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// English-ish singular form of a plural collection name.
pub fn singularize(word: &str) -> String {
    let lower = word.to_lowercase();
    let last = lower.rsplit('_').next().unwrap_or(&lower);

    if SINGULAR_EXCEPTIONS.contains(last)
        || last.ends_with("ss")
        || last.ends_with("us")
        || last.ends_with("is")
    {
        return lower;
    }

    if let Some(stem) = lower.strip_suffix("ies") {
        format!("{}y", stem)
    } else if let Some(stem) = lower.strip_suffix("ves") {
        format!("{}f", stem)
    } else if let Some(stem) = lower.strip_suffix("ses") {
        format!("{}s", stem)
    } else if let Some(stem) = lower.strip_suffix('s') {
        stem.to_string()
    } else {
        lower
    }
}

/// Table name for an entity type derived from a tag, path segment or hint.
pub fn entity_type_name(raw: &str) -> String {
    sanitize_table_name(&singularize(&to_snake_case(raw)))
}

/// Junction table name; symmetric in its arguments.
pub fn junction_name(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    sanitize_table_name(&format!("{}_{}", first, second))
}

/// Name of the column holding a reference to `table`.
pub fn foreign_key_column(table: &str) -> String {
    sanitize_column_name(&format!("{}_id", table))
}

/// Whether a field name plausibly refers to rows of `table`.
pub fn field_matches_table(field: &str, table: &str) -> bool {
    let snake = to_snake_case(field);
    let as_table = entity_type_name(field);

    if as_table == table || snake == table {
        return true;
    }
    if as_table.ends_with(&format!("_{}", table)) {
        return true;
    }
    FIELD_ALIASES
        .get(table)
        .is_some_and(|aliases| aliases.iter().any(|a| *a == snake || *a == as_table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("entries"), "entry");
        assert_eq!(singularize("citations"), "citation");
        assert_eq!(singularize("series"), "series");
        assert_eq!(singularize("species"), "species");
        assert_eq!(singularize("polymer_entities"), "polymer_entity");
        assert_eq!(singularize("leaves"), "leaf");
        assert_eq!(singularize("statuses"), "status");
        assert_eq!(singularize("entry"), "entry");
        assert_eq!(singularize("chem_species"), "chem_species");
        assert_eq!(singularize("ids"), "id");
        assert_eq!(singularize("tags"), "tag");
        assert_eq!(singularize("gas"), "gas");
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_table_name("Polymer Entity!"), "polymer_entity");
        assert_eq!(sanitize_table_name("__a--b__"), "a_b");
        assert_eq!(sanitize_table_name("3d_model"), "table_3d_model");
        assert_eq!(sanitize_column_name("2nd"), "col_2nd");
        assert_eq!(sanitize_table_name("order"), "order_tbl");
        assert_eq!(sanitize_column_name("index"), "index_col");
        assert_eq!(sanitize_column_name("struct.title"), "struct_title");
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("polymerEntities"), "polymer_entities");
        assert_eq!(to_snake_case("CoreEntry"), "core_entry");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("rcsb_id"), "rcsb_id");
    }

    #[test]
    fn test_entity_type_name() {
        assert_eq!(entity_type_name("polymerEntities"), "polymer_entity");
        assert_eq!(entity_type_name("CoreEntry"), "core_entry");
        assert_eq!(entity_type_name("orders"), "order_tbl");
    }

    #[test]
    fn test_junction_name_symmetry() {
        for (a, b) in [("entry", "polymer_entity"), ("b", "a"), ("same", "same")] {
            assert_eq!(junction_name(a, b), junction_name(b, a));
        }
        assert_eq!(junction_name("polymer_entity", "entry"), "entry_polymer_entity");
    }

    #[test]
    fn test_field_matches_table() {
        assert!(field_matches_table("polymer_entities", "polymer_entity"));
        assert!(field_matches_table("primaryCitation", "citation"));
        assert!(field_matches_table("entity_poly", "polymer_entity"));
        assert!(!field_matches_table("struct", "polymer_entity"));
        assert_eq!(foreign_key_column("chem_comp"), "chem_comp_id");
    }
}
