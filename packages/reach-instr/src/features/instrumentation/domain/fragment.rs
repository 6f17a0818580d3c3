//! Instrumentation fragment IR
//!
//! Instrumentors describe the code they want injected as a small typed
//! statement tree instead of source text. The tree is lowered to bytecode
//! by `infrastructure::codegen` and rendered as Java-like text for debug
//! artifacts.

use std::fmt;

/// Literal operand of a static call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Str(String),
    Null,
    Int(i32),
    Bool(bool),
    /// Class literal of the instrumented type
    ThisClass,
}

impl Argument {
    /// `Some(text)` becomes a string literal, `None` becomes `null`
    pub fn optional_str(value: Option<&str>) -> Self {
        match value {
            Some(text) => Argument::Str(text.to_string()),
            None => Argument::Null,
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Str(text) => {
                f.write_str("\"")?;
                for c in text.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        other => write!(f, "{other}")?,
                    }
                }
                f.write_str("\"")
            }
            Argument::Null => f.write_str("null"),
            Argument::Int(value) => write!(f, "{value}"),
            Argument::Bool(value) => write!(f, "{value}"),
            Argument::ThisClass => f.write_str("$class"),
        }
    }
}

/// `invokestatic owner.name(descriptor)` with literal arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticCall {
    /// Dotted owner type, e.g. `reach.runtime.TraceCollector`
    pub owner: String,
    pub name: String,
    /// JVM method descriptor the arguments must match
    pub descriptor: String,
    pub arguments: Vec<Argument>,
}

impl StaticCall {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        arguments: Vec<Argument>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
            arguments,
        }
    }
}

impl fmt::Display for StaticCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.owner, self.name)?;
        for (i, argument) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{argument}")?;
        }
        f.write_str(");")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Invoke(StaticCall),
    /// Runs `body` the first time control passes; `flag` is a static boolean member
    Once { flag: String, body: Vec<Statement> },
    /// Runs `body` while the static int member `counter` is below `limit`
    Bounded {
        counter: String,
        limit: i32,
        body: Vec<Statement>,
    },
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Invoke(call) => write!(f, "{call}"),
            Statement::Once { flag, body } => {
                write!(f, "if(!{flag}){{{flag}=true;")?;
                write_block(f, body)?;
                f.write_str("}")
            }
            Statement::Bounded {
                counter,
                limit,
                body,
            } => {
                write!(f, "if({counter}<{limit}){{{counter}++;")?;
                write_block(f, body)?;
                f.write_str("}")
            }
        }
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, statements: &[Statement]) -> fmt::Result {
    for statement in statements {
        write!(f, "{statement}")?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// `boolean`, descriptor `Z`
    Flag,
    /// `int`, descriptor `I`
    Counter,
}

impl MemberKind {
    pub fn descriptor(&self) -> &'static str {
        match self {
            MemberKind::Flag => "Z",
            MemberKind::Counter => "I",
        }
    }

    pub fn java_type(&self) -> &'static str {
        match self {
            MemberKind::Flag => "boolean",
            MemberKind::Counter => "int",
        }
    }
}

/// Static member a fragment needs on the instrumented type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDecl {
    pub name: String,
    pub kind: MemberKind,
}

/// Per-construct accumulator filled by instrumentors in registry order.
///
/// An empty fragment means the construct is left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentationFragment {
    statements: Vec<Statement>,
    members: Vec<MemberDecl>,
}

impl InstrumentationFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    pub fn declare_flag(&mut self, name: impl Into<String>) {
        self.declare(name.into(), MemberKind::Flag);
    }

    pub fn declare_counter(&mut self, name: impl Into<String>) {
        self.declare(name.into(), MemberKind::Counter);
    }

    fn declare(&mut self, name: String, kind: MemberKind) {
        if !self.members.iter().any(|member| member.name == name) {
            self.members.push(MemberDecl { name, kind });
        }
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn members(&self) -> &[MemberDecl] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&MemberDecl> {
        self.members.iter().find(|member| member.name == name)
    }

    /// Source text of the guarded block as injected into `construct`
    pub fn guarded_source(&self, construct: &str) -> String {
        let mut source = String::new();
        for member in &self.members {
            source.push_str(&format!(
                "public static transient {} {};",
                member.kind.java_type(),
                member.name
            ));
        }
        source.push_str(&format!(
            "try {{{self}}}catch(IllegalStateException ise) {{ throw ise; }}\
             catch(Throwable e) {{ System.err.println(e.getClass().getName() + \" occurred during \
             execution of instrumentation code in {construct}: \" + e.getMessage()); }}"
        ));
        source
    }
}

impl fmt::Display for InstrumentationFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_block(f, &self.statements)
    }
}
