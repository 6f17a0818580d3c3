use std::fmt;

use super::ClassFormatError;

/// Decoded field descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    /// Internal name, e.g. `java/lang/String`
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    pub fn parse(descriptor: &str) -> Result<Self, ClassFormatError> {
        let mut parser = DescriptorParser::new(descriptor);
        let ty = parser.parse_field()?;
        if !parser.is_end() {
            return Err(ClassFormatError::InvalidDescriptor(descriptor.to_string()));
        }
        Ok(ty)
    }

    /// Local-variable slots taken by a value of this type
    pub fn slot_size(&self) -> u16 {
        match self {
            FieldType::Long | FieldType::Double => 2,
            _ => 1,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Object(_) | FieldType::Array(_))
    }

    /// Source-level spelling: `int`, `java.lang.String[]`, `a.b.Outer$Inner`
    pub fn source_name(&self) -> String {
        match self {
            FieldType::Byte => "byte".to_string(),
            FieldType::Char => "char".to_string(),
            FieldType::Double => "double".to_string(),
            FieldType::Float => "float".to_string(),
            FieldType::Int => "int".to_string(),
            FieldType::Long => "long".to_string(),
            FieldType::Short => "short".to_string(),
            FieldType::Boolean => "boolean".to_string(),
            FieldType::Object(internal) => internal.replace('/', "."),
            FieldType::Array(element) => format!("{}[]", element.source_name()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Byte => f.write_str("B"),
            FieldType::Char => f.write_str("C"),
            FieldType::Double => f.write_str("D"),
            FieldType::Float => f.write_str("F"),
            FieldType::Int => f.write_str("I"),
            FieldType::Long => f.write_str("J"),
            FieldType::Short => f.write_str("S"),
            FieldType::Boolean => f.write_str("Z"),
            FieldType::Object(internal) => write!(f, "L{internal};"),
            FieldType::Array(element) => write!(f, "[{element}"),
        }
    }
}

/// Decoded method descriptor; `return_type` is `None` for `void`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Result<Self, ClassFormatError> {
        let mut parser = DescriptorParser::new(descriptor);
        let signature = parser.parse_method()?;
        if !parser.is_end() {
            return Err(ClassFormatError::InvalidDescriptor(descriptor.to_string()));
        }
        Ok(signature)
    }

    /// Comma-joined source names, the raw text between a signature's parentheses
    pub fn parameter_list_text(&self) -> String {
        self.parameters
            .iter()
            .map(FieldType::source_name)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn parameter_slots(&self) -> u16 {
        self.parameters.iter().map(FieldType::slot_size).sum()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for parameter in &self.parameters {
            write!(f, "{parameter}")?;
        }
        f.write_str(")")?;
        match &self.return_type {
            Some(ty) => write!(f, "{ty}"),
            None => f.write_str("V"),
        }
    }
}

struct DescriptorParser<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> DescriptorParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    fn is_end(&mut self) -> bool {
        self.chars.peek().is_none()
    }

    fn error(&self) -> ClassFormatError {
        ClassFormatError::InvalidDescriptor(self.source.to_string())
    }

    fn parse_method(&mut self) -> Result<MethodDescriptor, ClassFormatError> {
        match self.chars.next() {
            Some((_, '(')) => {}
            _ => return Err(self.error()),
        }

        let mut parameters = Vec::new();
        loop {
            match self.chars.peek() {
                Some((_, ')')) => {
                    self.chars.next();
                    break;
                }
                Some(_) => parameters.push(self.parse_field()?),
                None => return Err(self.error()),
            }
        }

        let return_type = match self.chars.peek() {
            Some((_, 'V')) => {
                self.chars.next();
                None
            }
            Some(_) => Some(self.parse_field()?),
            None => return Err(self.error()),
        };

        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }

    fn parse_field(&mut self) -> Result<FieldType, ClassFormatError> {
        let (start, ch) = self.chars.next().ok_or_else(|| self.error())?;
        let ty = match ch {
            'B' => FieldType::Byte,
            'C' => FieldType::Char,
            'D' => FieldType::Double,
            'F' => FieldType::Float,
            'I' => FieldType::Int,
            'J' => FieldType::Long,
            'S' => FieldType::Short,
            'Z' => FieldType::Boolean,
            '[' => FieldType::Array(Box::new(self.parse_field()?)),
            'L' => {
                let name_start = start + 1;
                loop {
                    match self.chars.next() {
                        Some((end, ';')) if end > name_start => {
                            break FieldType::Object(self.source[name_start..end].to_string());
                        }
                        Some((_, ';')) | None => return Err(self.error()),
                        Some(_) => {}
                    }
                }
            }
            _ => return Err(self.error()),
        };
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_descriptor() {
        let desc = MethodDescriptor::parse("(ILjava/lang/String;[[JLa/Outer$Inner;)V").unwrap();
        assert_eq!(desc.parameters.len(), 4);
        assert_eq!(desc.return_type, None);
        assert_eq!(
            desc.parameter_list_text(),
            "int,java.lang.String,long[][],a.Outer$Inner"
        );
        assert_eq!(desc.parameter_slots(), 4);
        assert_eq!(desc.to_string(), "(ILjava/lang/String;[[JLa/Outer$Inner;)V");
    }

    #[test]
    fn test_long_and_double_take_two_slots() {
        let desc = MethodDescriptor::parse("(JD)I").unwrap();
        assert_eq!(desc.parameter_slots(), 4);
        assert_eq!(desc.return_type, Some(FieldType::Int));
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in ["", "(", "(I", "(L;)V", "(Q)V", "()VV", "Ljava/lang/String"] {
            assert!(MethodDescriptor::parse(bad).is_err(), "{bad}");
        }
        assert!(FieldType::parse("I").is_ok());
        assert!(FieldType::parse("II").is_err());
    }
}
