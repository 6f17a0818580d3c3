//! Fragment lowering
//!
//! Turns an `InstrumentationFragment` into a self-contained `SpliceBlock`
//! wrapped in the runtime guard:
//!
//! ```text
//!      [fragment]
//!      goto join
//! h1:  athrow                      ; IllegalStateException is rethrown
//! h2:  System.err.println(...)     ; any other Throwable is reported
//! join:
//! ```

use std::collections::BTreeSet;

use byteorder::{BigEndian, WriteBytesExt};

use crate::errors::{InstrumentError, Result};
use crate::features::classfile::{
    op, ClassFormatError, ConstantPool, ExceptionEntry, FieldType, MethodDescriptor, SpliceBlock,
    StackMapFrame, VerificationType,
};
use crate::features::instrumentation::domain::{
    Argument, InstrumentationFragment, MemberKind, Statement, StaticCall,
};
use crate::shared::constants::{format, names};

const STRING_BUILDER: &str = "java/lang/StringBuilder";

/// Where the lowered block will live
#[derive(Debug, Clone)]
pub struct LoweringTarget<'a> {
    /// Internal name of the instrumented type
    pub this_class: &'a str,
    pub major_version: u16,
    /// Display form of the construct, used in error messages and the runtime report
    pub construct: &'a str,
    /// Locals at block entry
    pub locals: Vec<VerificationType>,
}

/// Lowers `fragment` plus its guard into a block ready for splicing
pub fn lower_guarded(
    fragment: &InstrumentationFragment,
    pool: &mut ConstantPool,
    target: &LoweringTarget<'_>,
) -> Result<SpliceBlock> {
    if fragment.is_empty() {
        return Err(InstrumentError::injection(
            target.construct,
            "nothing to inject",
        ));
    }

    let mut asm = Assembler::new(pool, target);
    for statement in fragment.statements() {
        asm.statement(statement, fragment)?;
    }
    let fragment_end = asm.offset();

    let join = asm.new_label();
    asm.branch(op::GOTO, join);

    let rethrow = asm.offset();
    asm.op(op::ATHROW, 0);

    let report = asm.offset();
    asm.report_failure()?;
    asm.bind(join);

    let control = asm.pool.add_class(names::CONTROL_EXCEPTION)?;
    let throwable = asm.pool.add_class(names::THROWABLE)?;
    let exception_table = vec![
        ExceptionEntry {
            start_pc: 0,
            end_pc: fragment_end as u16,
            handler_pc: rethrow as u16,
            catch_type: control,
        },
        ExceptionEntry {
            start_pc: 0,
            end_pc: fragment_end as u16,
            handler_pc: report as u16,
            catch_type: throwable,
        },
    ];

    let mut frames: Vec<StackMapFrame> = asm
        .targets
        .iter()
        .filter(|&&offset| offset != asm.offset())
        .map(|&offset| StackMapFrame {
            offset,
            locals: target.locals.clone(),
            stack: Vec::new(),
        })
        .collect();
    frames.push(StackMapFrame {
        offset: rethrow,
        locals: target.locals.clone(),
        stack: vec![VerificationType::Object(control)],
    });
    frames.push(StackMapFrame {
        offset: report,
        locals: target.locals.clone(),
        stack: vec![VerificationType::Object(throwable)],
    });
    frames.sort_by_key(|frame| frame.offset);

    let max_stack = asm.max_depth;
    let code = asm.finish()?;
    Ok(SpliceBlock {
        code,
        exception_table,
        frames,
        max_stack,
        locals: target.locals.clone(),
    })
}

struct Assembler<'p, 't> {
    pool: &'p mut ConstantPool,
    target: &'t LoweringTarget<'t>,
    code: Vec<u8>,
    labels: Vec<Option<u32>>,
    /// (opcode offset, label)
    patches: Vec<(u32, usize)>,
    /// Offsets of bound labels; each needs a frame
    targets: BTreeSet<u32>,
    depth: u16,
    max_depth: u16,
}

impl<'p, 't> Assembler<'p, 't> {
    fn new(pool: &'p mut ConstantPool, target: &'t LoweringTarget<'t>) -> Self {
        Self {
            pool,
            target,
            code: Vec::with_capacity(64),
            labels: Vec::new(),
            patches: Vec::new(),
            targets: BTreeSet::new(),
            depth: 0,
            max_depth: 0,
        }
    }

    fn offset(&self) -> u32 {
        self.code.len() as u32
    }

    fn fail(&self, reason: impl Into<String>) -> InstrumentError {
        InstrumentError::injection(self.target.construct, reason)
    }

    fn adjust(&mut self, delta: i32) {
        self.depth = (self.depth as i32 + delta).max(0) as u16;
        self.max_depth = self.max_depth.max(self.depth);
    }

    fn op(&mut self, opcode: u8, delta: i32) {
        self.code.push(opcode);
        self.adjust(delta);
    }

    fn op_u16(&mut self, opcode: u8, operand: u16, delta: i32) {
        self.code.push(opcode);
        self.code.extend_from_slice(&operand.to_be_bytes());
        self.adjust(delta);
    }

    fn new_label(&mut self) -> usize {
        self.labels.push(None);
        self.labels.len() - 1
    }

    fn bind(&mut self, label: usize) {
        let offset = self.offset();
        self.labels[label] = Some(offset);
        self.targets.insert(offset);
    }

    /// Emits a 16-bit branch; `ifne`/`if_icmpge` consume their operands
    fn branch(&mut self, opcode: u8, label: usize) {
        let consumed = match opcode {
            op::IF_ICMPGE => 2,
            op::GOTO => 0,
            _ => 1,
        };
        self.patches.push((self.offset(), label));
        self.op_u16(opcode, 0, -consumed);
    }

    fn push_int(&mut self, value: i32) -> Result<()> {
        match value {
            -1..=5 => self.op((op::ICONST_0 as i32 + value) as u8, 1),
            -128..=127 => {
                self.code.push(op::BIPUSH);
                self.code.push(value as i8 as u8);
                self.adjust(1);
            }
            -32768..=32767 => self.op_u16(op::SIPUSH, value as i16 as u16, 1),
            _ => {
                let index = self.pool.add_integer(value)?;
                self.ldc(index);
            }
        }
        Ok(())
    }

    fn ldc(&mut self, index: u16) {
        if index <= u8::MAX as u16 {
            self.code.push(op::LDC);
            self.code.push(index as u8);
            self.adjust(1);
        } else {
            self.op_u16(op::LDC_W, index, 1);
        }
    }

    fn statement(&mut self, statement: &Statement, fragment: &InstrumentationFragment) -> Result<()> {
        match statement {
            Statement::Invoke(call) => self.invoke(call),
            Statement::Once { flag, body } => {
                let field = self.member_ref(fragment, flag, MemberKind::Flag)?;
                let end = self.new_label();
                self.op_u16(op::GETSTATIC, field, 1);
                self.branch(op::IFNE, end);
                self.op(op::ICONST_1, 1);
                self.op_u16(op::PUTSTATIC, field, -1);
                for inner in body {
                    self.statement(inner, fragment)?;
                }
                self.bind(end);
                Ok(())
            }
            Statement::Bounded {
                counter,
                limit,
                body,
            } => {
                let field = self.member_ref(fragment, counter, MemberKind::Counter)?;
                let end = self.new_label();
                self.op_u16(op::GETSTATIC, field, 1);
                self.push_int(*limit)?;
                self.branch(op::IF_ICMPGE, end);
                self.op_u16(op::GETSTATIC, field, 1);
                self.op(op::ICONST_1, 1);
                self.op(op::IADD, -1);
                self.op_u16(op::PUTSTATIC, field, -1);
                for inner in body {
                    self.statement(inner, fragment)?;
                }
                self.bind(end);
                Ok(())
            }
        }
    }

    fn member_ref(
        &mut self,
        fragment: &InstrumentationFragment,
        name: &str,
        expected: MemberKind,
    ) -> Result<u16> {
        match fragment.member(name) {
            Some(member) if member.kind == expected => Ok(self.pool.add_fieldref(
                self.target.this_class,
                name,
                expected.descriptor(),
            )?),
            Some(member) => Err(self.fail(format!(
                "member {name} is declared as {} but used as {}",
                member.kind.java_type(),
                expected.java_type()
            ))),
            None => Err(self.fail(format!("member {name} is not declared"))),
        }
    }

    fn invoke(&mut self, call: &StaticCall) -> Result<()> {
        if !is_binary_name(&call.owner) || call.name.is_empty() {
            return Err(self.fail(format!("unknown owner {}.{}", call.owner, call.name)));
        }
        let descriptor = MethodDescriptor::parse(&call.descriptor)
            .map_err(|err| self.fail(format!("invalid descriptor {}: {err}", call.descriptor)))?;
        if descriptor.parameters.len() != call.arguments.len() {
            return Err(self.fail(format!(
                "{}.{} expects {} arguments, got {}",
                call.owner,
                call.name,
                descriptor.parameters.len(),
                call.arguments.len()
            )));
        }

        let depth_before = self.depth;
        for (position, (parameter, argument)) in
            descriptor.parameters.iter().zip(&call.arguments).enumerate()
        {
            if !argument_fits(parameter, argument) {
                return Err(self.fail(format!(
                    "argument {position} of {}.{} is {argument}, expected {}",
                    call.owner,
                    call.name,
                    parameter.source_name()
                )));
            }
            self.argument(argument)?;
        }

        let method = self.pool.add_methodref(
            &call.owner.replace('.', "/"),
            &call.name,
            &call.descriptor,
        )?;
        let pushed = descriptor.return_type.as_ref().map_or(0, FieldType::slot_size);
        let popped = (self.depth - depth_before) as i32;
        self.op_u16(op::INVOKESTATIC, method, pushed as i32 - popped);
        match pushed {
            1 => self.op(op::POP, -1),
            2 => self.op(op::POP2, -2),
            _ => {}
        }
        Ok(())
    }

    fn argument(&mut self, argument: &Argument) -> Result<()> {
        match argument {
            Argument::Str(text) => {
                let index = self.pool.add_string(text)?;
                self.ldc(index);
            }
            Argument::Null => self.op(op::ACONST_NULL, 1),
            Argument::Int(value) => self.push_int(*value)?,
            Argument::Bool(value) => self.op(if *value { op::ICONST_1 } else { op::ICONST_0 }, 1),
            Argument::ThisClass => {
                if self.target.major_version < format::JAVA_5 {
                    return Err(self.fail(format!(
                        "class literals need format version {} or later, found {}",
                        format::JAVA_5,
                        self.target.major_version
                    )));
                }
                let index = self.pool.add_class(self.target.this_class)?;
                self.ldc(index);
            }
        }
        Ok(())
    }

    /// Handler body: `System.err.println(e.getClass().getName() + " ... in <construct>: " + e.getMessage())`
    fn report_failure(&mut self) -> Result<()> {
        // Entered with [Throwable]
        self.depth = 1;
        self.max_depth = self.max_depth.max(1);

        let builder = self.pool.add_class(STRING_BUILDER)?;
        let init = self.pool.add_methodref(STRING_BUILDER, "<init>", "()V")?;
        let get_class = self
            .pool
            .add_methodref("java/lang/Object", "getClass", "()Ljava/lang/Class;")?;
        let get_name = self
            .pool
            .add_methodref("java/lang/Class", "getName", "()Ljava/lang/String;")?;
        let append = self.pool.add_methodref(
            STRING_BUILDER,
            "append",
            "(Ljava/lang/String;)Ljava/lang/StringBuilder;",
        )?;
        let get_message =
            self.pool
                .add_methodref(names::THROWABLE, "getMessage", "()Ljava/lang/String;")?;
        let to_string = self
            .pool
            .add_methodref(STRING_BUILDER, "toString", "()Ljava/lang/String;")?;
        let err = self
            .pool
            .add_fieldref("java/lang/System", "err", "Ljava/io/PrintStream;")?;
        let println = self
            .pool
            .add_methodref("java/io/PrintStream", "println", "(Ljava/lang/String;)V")?;
        let message = self.pool.add_string(&format!(
            " occurred during execution of instrumentation code in {}: ",
            self.target.construct
        ))?;

        self.op_u16(op::NEW, builder, 1); // T B
        self.op(op::DUP, 1); // T B B
        self.op_u16(op::INVOKESPECIAL, init, -1); // T B
        self.op(op::SWAP, 0); // B T
        self.op(op::DUP_X1, 1); // T B T
        self.op_u16(op::INVOKEVIRTUAL, get_class, 0); // T B C
        self.op_u16(op::INVOKEVIRTUAL, get_name, 0); // T B S
        self.op_u16(op::INVOKEVIRTUAL, append, -1); // T B
        self.ldc(message); // T B S
        self.op_u16(op::INVOKEVIRTUAL, append, -1); // T B
        self.op(op::SWAP, 0); // B T
        self.op_u16(op::INVOKEVIRTUAL, get_message, 0); // B S
        self.op_u16(op::INVOKEVIRTUAL, append, -1); // B
        self.op_u16(op::INVOKEVIRTUAL, to_string, 0); // S
        self.op_u16(op::GETSTATIC, err, 1); // S P
        self.op(op::SWAP, 0); // P S
        self.op_u16(op::INVOKEVIRTUAL, println, -2);
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>> {
        if self.code.len() > u16::MAX as usize {
            return Err(ClassFormatError::CodeTooLarge(self.code.len()).into());
        }
        for &(at, label) in &self.patches {
            let target = self.labels[label]
                .ok_or_else(|| InstrumentError::injection(self.target.construct, "unbound label"))?;
            let relative = i16::try_from(target as i64 - at as i64)
                .map_err(|_| ClassFormatError::BranchOverflow { at, target })?;
            let mut operand = Vec::with_capacity(2);
            operand.write_i16::<BigEndian>(relative)?;
            let start = at as usize + 1;
            self.code[start..start + 2].copy_from_slice(&operand);
        }
        Ok(self.code)
    }
}

/// Dotted binary name: non-empty identifier segments
fn is_binary_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && !segment.starts_with(|c: char| c.is_ascii_digit())
                && segment.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        })
}

fn argument_fits(parameter: &FieldType, argument: &Argument) -> bool {
    match argument {
        Argument::Str(_) => matches!(
            parameter,
            FieldType::Object(name)
                if name == "java/lang/String"
                    || name == "java/lang/CharSequence"
                    || name == "java/lang/Object"
        ),
        Argument::Null => parameter.is_reference(),
        Argument::Int(value) => match parameter {
            FieldType::Int => true,
            FieldType::Short => i16::try_from(*value).is_ok(),
            FieldType::Byte => i8::try_from(*value).is_ok(),
            FieldType::Char => u16::try_from(*value).is_ok(),
            _ => false,
        },
        Argument::Bool(_) => matches!(parameter, FieldType::Boolean),
        Argument::ThisClass => matches!(
            parameter,
            FieldType::Object(name) if name == "java/lang/Class" || name == "java/lang/Object"
        ),
    }
}
