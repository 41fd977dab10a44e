//! The rewrite prompt handed to the LLM.
//!
//! Section order and labels are what the model keys on, so the template is
//! fixed. Document and request go in verbatim; nothing is escaped.

use std::sync::LazyLock;

use regex::Regex;

pub const SYSTEM_MARKER: &str = "### SYSTEM:";
pub const CONFIG_MARKER: &str = "### CONFIG:";
pub const REQUEST_MARKER: &str = "### USER REQUEST:";
pub const NEW_CONFIG_MARKER: &str = "### NEW CONFIG:";

/// Default stop sequence. Also the prefix of every section marker.
pub const STOP_SEQUENCE: &str = "###";

const SYSTEM_INSTRUCTION: &str = "You are a YAML configuration assistant. \
Modify the following PTP config based on the user's instruction.";

static SECTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^\s*#{1,}\s*(SYSTEM|CONFIG|USER REQUEST|NEW CONFIG)\s*:").unwrap()
});

pub fn build(document: &str, request: &str) -> String {
    format!(
        "\n{SYSTEM_MARKER}\n{SYSTEM_INSTRUCTION}\n\n\
         {CONFIG_MARKER}\n{document}\n\n\
         {REQUEST_MARKER}\n{request}\n\n\
         {NEW_CONFIG_MARKER}\n"
    )
}

/// Parts of a user request that could be read as prompt structure: the stop
/// sequence, and anything shaped like one of the section headers.
pub fn injection_markers(request: &str) -> Vec<String> {
    let mut found = Vec::new();
    if request.contains(STOP_SEQUENCE) {
        found.push(STOP_SEQUENCE.to_string());
    }
    for caps in SECTION_HEADER.captures_iter(request) {
        let label = format!("{}:", caps[1].to_uppercase());
        if !found.contains(&label) {
            found.push(label);
        }
    }
    found
}
