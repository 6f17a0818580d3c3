const INDENT: &str = "  ";

/// Line-breaks generated source for debug artifacts.
///
/// `;` and `{` and `}` each end a line; braces move the indent level.
/// Characters inside string literals are not special-cased.
///
/// ```
/// use reach_instr::pretty_print;
///
/// assert_eq!(pretty_print("if(a){b();}"), "if(a){\n  b();\n  }\n");
/// ```
pub fn pretty_print(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + source.len() / 4);
    let mut level: usize = 0;
    for c in source.chars() {
        out.push(c);
        match c {
            ';' => {}
            '{' => level += 1,
            '}' => level = level.saturating_sub(1),
            _ => continue,
        }
        out.push('\n');
        for _ in 0..level {
            out.push_str(INDENT);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_blocks() {
        let pretty = pretty_print("try {if(!F){F=true;x();}}catch(E e) { throw e; }");
        let lines: Vec<&str> = pretty.lines().collect();
        assert_eq!(lines[0], "try {");
        assert_eq!(lines[1], "  if(!F){");
        assert_eq!(lines[2], "    F=true;");
        assert_eq!(lines[3], "    x();");
        assert_eq!(lines[4], "    }");
        assert_eq!(lines[5], "  }");
        assert_eq!(lines[6], "catch(E e) {");
    }

    #[test]
    fn test_unbalanced_close_does_not_underflow() {
        assert_eq!(pretty_print("}}a"), "}\n}\na");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(pretty_print("abc"), "abc");
    }
}
