//! Escape normalizer: undoes backend-specific escaping so output from the
//! two service dialects can be compared with a plain textual diff.
//!
//! One dialect emits `<`, `>`, etc. for markup characters and
//! backslash-escapes forward slashes; the other emits the literal characters.
//! Decoding is generic-first: if the whole body parses as a JSON string
//! literal, that decode wins and the manual replacement list never runs. The
//! two strategies are mutually exclusive, and a generic decode that leaves
//! dialect artifacts behind is a known gap of the upstream services' output,
//! not reconciled here.

use std::sync::LazyLock;

use regex_lite::Regex;

/// Sentinel written over known-volatile field values in scrub mode.
pub const SCRUB_SENTINEL: &str = "SCRUBBED";

// Volatile fields that both dialects emit as `null` and that must never
// register as a difference.
static NULL_ONLY_FIELDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s*"json(?:ID|Lineage)"\s*:\s*null\s*,?"#).expect("static pattern")
});

// One dialect wraps certain string values in an extra pair of escaped
// quotes: `"\"LuBoV, RBoV\""` instead of `"LuBoV, RBoV"`.
static DOUBLED_QUOTES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""\\"([^"]*?)\\"""#).expect("static pattern"));

static SCRUB_IS_MOVED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""isMoved":(false|true)"#).expect("static pattern"));
static SCRUB_IS_LINEAGE_UPDATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""isLineageUpdated":(false|true)"#).expect("static pattern"));
static SCRUB_PREVIOUS_LINEAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""previousLineage":"[^"]*""#).expect("static pattern"));
static SCRUB_RELEASE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""mslReleaseNumber": *[0-9]+"#).expect("static pattern"));
// The note fields may be null or a quoted string containing escaped quotes:
// `"prevNotes":"Renamed \"T4-like viruses\" to T4likevirus"`.
static SCRUB_PREV_NOTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""prevNotes":(null|"((?:[^"\\]|\\.)*)")"#).expect("static pattern")
});
static SCRUB_NEXT_NOTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""nextNotes":(null|"((?:[^"\\]|\\.)*)")"#).expect("static pattern")
});

/// Decode backend-specific escapes and strip volatile artifacts.
///
/// With `scrub` enabled, values of fields that legitimately differ between
/// runs (move flags, previous-lineage text, release numbers, free-text notes)
/// are additionally replaced by [`SCRUB_SENTINEL`] to suppress false-positive
/// diffs.
pub fn normalize(content: &str, scrub: bool) -> String {
    let content = match generic_decode(content) {
        Some(decoded) => decoded,
        None => manual_decode(content),
    };

    let content = NULL_ONLY_FIELDS.replace_all(&content, "");
    // Field removal can leave double commas or a comma before a closing brace.
    let content = content.replace(",,", ",").replace(",}", "}");
    // One backend escapes forward slashes, the other does not.
    let content = content.replace("\\/", "/");
    let content = DOUBLED_QUOTES.replace_all(&content, "\"${1}\"");

    if scrub {
        scrub_volatile_fields(&content)
    } else {
        content.into_owned()
    }
}

/// Single decode pass treating the whole body as a JSON string literal.
/// Fails (returns `None`) as soon as the body contains an unescaped quote,
/// which is the common case for JSON payloads.
fn generic_decode(content: &str) -> Option<String> {
    serde_json::from_str::<String>(&format!("\"{content}\"")).ok()
}

/// Fallback replacement list for the numeric escapes one backend emits.
fn manual_decode(content: &str) -> String {
    content
        .replace("\\u00eb", "\u{00eb}")
        .replace("\\u2011", "\u{2011}")
        .replace("\\u0027", "'")
        .replace("\\u0026", "&")
        .replace("\\u003E", ">")
        .replace("\\u003C\\", "<")
        .replace("\\u003C", "<")
        .replace("\\u0022", "\\\"")
}

fn scrub_volatile_fields(content: &str) -> String {
    let content = SCRUB_IS_MOVED.replace_all(content, format!("\"isMoved\":\"{SCRUB_SENTINEL}\""));
    let content = SCRUB_IS_LINEAGE_UPDATED.replace_all(
        &content,
        format!("\"isLineageUpdated\":\"{SCRUB_SENTINEL}\""),
    );
    let content = SCRUB_PREVIOUS_LINEAGE.replace_all(
        &content,
        format!("\"previousLineage\":\"{SCRUB_SENTINEL}\""),
    );
    let content = SCRUB_RELEASE_NUMBER.replace_all(
        &content,
        format!("\"mslReleaseNumber\":\"{SCRUB_SENTINEL}\""),
    );
    let content =
        SCRUB_PREV_NOTES.replace_all(&content, format!("\"prevNotes\":\"{SCRUB_SENTINEL}\""));
    let content =
        SCRUB_NEXT_NOTES.replace_all(&content, format!("\"nextNotes\":\"{SCRUB_SENTINEL}\""));
    content.into_owned()
}
