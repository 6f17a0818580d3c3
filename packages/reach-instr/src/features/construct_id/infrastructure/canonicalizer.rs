//! Name canonicalization
//!
//! Strips package qualification from parameter-type lists and collapses
//! nested-type qualifiers (`Outer$Inner`) to their innermost simple name.
//! A single left-to-right regex scan is used, so commas inside generic
//! argument lists never act as separators.

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::{InstrumentError, Result};

lazy_static! {
    /// `(qualifier.)*simpleName`
    static ref QUALIFIED_TYPE: Regex =
        Regex::new(r"([0-9a-zA-Z_\.\$]*\.)([a-zA-Z0-9_\$]*)").expect("valid qualified-type pattern");

    /// `Outer$Inner`, matched against a whole simple name
    static ref NESTED_TYPE: Regex =
        Regex::new(r"^([0-9a-zA-Z_\$]*\$)([a-zA-Z0-9_]*)$").expect("valid nested-type pattern");
}

/// Removes package qualification from every type name in `text`.
///
/// Never fails; text without qualified names is returned unchanged.
///
/// ```
/// use reach_instr::remove_package_context;
///
/// assert_eq!(
///     remove_package_context("java.util.Map<java.lang.String,java.lang.Object>,int"),
///     "Map<String,Object>,int"
/// );
/// assert_eq!(remove_package_context("a.b.Outer$Inner"), "Inner");
/// ```
pub fn remove_package_context(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in QUALIFIED_TYPE.captures_iter(text) {
        let (Some(whole), Some(simple)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        match NESTED_TYPE.captures(simple.as_str()).and_then(|n| n.get(2)) {
            Some(inner) => out.push_str(inner.as_str()),
            None => out.push_str(simple.as_str()),
        }
        last = whole.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Canonicalizes a raw, fully qualified parameter-type list
pub fn strip_parameter_qualification(parameter_list: &str) -> String {
    remove_package_context(parameter_list)
}

/// Canonicalizes the parameter list of a full signature such as
/// `a.b.C.m(java.lang.String)`, leaving the part outside the brackets as is.
pub fn strip_signature_qualification(signature: &str) -> Result<String> {
    let (Some(open), Some(close)) = (signature.find('('), signature.rfind(')')) else {
        return Err(InstrumentError::InvalidSignature(signature.to_string()));
    };
    if close < open {
        return Err(InstrumentError::InvalidSignature(signature.to_string()));
    }

    let mut out = String::with_capacity(signature.len());
    out.push_str(&signature[..=open]);
    out.push_str(&remove_package_context(&signature[open + 1..close]));
    out.push_str(&signature[close..]);
    Ok(out)
}

/// Splits a parameter list on top-level commas; spaces are dropped
pub fn split_parameter_types(parameter_list: &str) -> Vec<String> {
    let mut parameters = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    for ch in parameter_list.chars() {
        match ch {
            '<' => {
                depth += 1;
                current.push(ch);
            }
            '>' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => parameters.push(std::mem::take(&mut current)),
            ' ' => {}
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        parameters.push(current);
    }
    parameters
}
