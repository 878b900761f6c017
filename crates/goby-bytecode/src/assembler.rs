//! Bytecode listing reader
//!
//! Parses the labelled text form of compiled programs:
//!
//! ```text
//! <Def:add>
//! params: a b
//! 0 getlocal 0 0
//! 1 getlocal 0 1
//! 2 send + 1
//! 3 leave
//! <ProgramStart>
//! 0 putself
//! 1 putobject 1
//! 2 putobject 2
//! 3 send add 2 @4
//! 4 leave
//! ```
//!
//! A leading instruction index is optional and ignored. A trailing `@N`
//! token records the source line. Lines starting with `#` are comments.

use crate::args::ArgSet;
use crate::instruction::{BytecodeError, InstructionSet, Program, SetKind};
use crate::op::{Literal, Op};

/// Parse a listing into a program
pub fn assemble(filename: &str, source: &str) -> Result<Program, BytecodeError> {
    let mut program = Program::new(filename);
    let mut current: Option<InstructionSet> = None;

    for (number, raw) in source.lines().enumerate() {
        let line_no = number + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('<') {
            if let Some(set) = current.take() {
                program.sets.push(set);
            }
            current = Some(parse_label(line, line_no, filename)?);
            continue;
        }

        let set = current
            .as_mut()
            .ok_or(BytecodeError::MissingLabel(line_no))?;

        if let Some(rest) = line.strip_prefix("params:") {
            for token in rest.split_whitespace() {
                let (name, kind) = ArgSet::parse_entry(token).ok_or_else(|| syntax(
                    line_no,
                    format!("invalid parameter '{}'", token),
                ))?;
                set.params.push(name, kind);
            }
            continue;
        }

        let mut tokens = tokenize(line, line_no)?;
        let mut source_line = 0;
        // `@N` is a line marker, `@name` is an instance variable operand
        if let Some(n) = tokens.last().and_then(line_marker) {
            source_line = n
                .parse()
                .map_err(|_| syntax(line_no, format!("invalid source line '{}'", n)))?;
            tokens.pop();
        }
        if tokens
            .first()
            .map(|t| !t.quoted && t.text.parse::<usize>().is_ok())
            .unwrap_or(false)
        {
            tokens.remove(0);
        }
        if tokens.is_empty() {
            return Err(syntax(line_no, "missing instruction".to_string()));
        }

        let op = parse_op(&tokens, line_no)?;
        set.define(op, source_line);
    }

    if let Some(set) = current.take() {
        program.sets.push(set);
    }

    log::debug!(
        "assembled {} instruction sets from {}",
        program.sets.len(),
        filename
    );
    Ok(program)
}

fn line_marker(token: &Token) -> Option<&str> {
    if token.quoted {
        return None;
    }
    token
        .text
        .strip_prefix('@')
        .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn syntax(line: usize, message: String) -> BytecodeError {
    BytecodeError::Syntax { line, message }
}

fn parse_label(line: &str, line_no: usize, filename: &str) -> Result<InstructionSet, BytecodeError> {
    let inner = line
        .strip_prefix('<')
        .and_then(|l| l.strip_suffix('>'))
        .ok_or_else(|| syntax(line_no, format!("malformed label '{}'", line)))?;

    if inner == SetKind::Program.label_prefix() {
        return Ok(InstructionSet::new(SetKind::Program, inner, filename));
    }

    let (prefix, name) = inner
        .split_once(':')
        .ok_or_else(|| syntax(line_no, format!("malformed label '{}'", line)))?;
    let kind = match prefix {
        "Def" => SetKind::MethodDef,
        "DefClass" => SetKind::ClassDef,
        "Block" => SetKind::Block,
        other => return Err(syntax(line_no, format!("unknown label type '{}'", other))),
    };
    if name.is_empty() {
        return Err(syntax(line_no, "empty label name".to_string()));
    }
    Ok(InstructionSet::new(kind, name, filename))
}

#[derive(Debug)]
struct Token {
    text: String,
    quoted: bool,
}

fn tokenize(line: &str, line_no: usize) -> Result<Vec<Token>, BytecodeError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '"' {
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => text.push(unescape(&mut chars, line_no)?),
                    c => text.push(c),
                }
            }
            if !closed {
                return Err(syntax(line_no, "unterminated string".to_string()));
            }
            tokens.push(Token { text, quoted: true });
            continue;
        }

        let mut text = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            text.push(c);
            chars.next();
        }
        tokens.push(Token {
            text,
            quoted: false,
        });
    }

    Ok(tokens)
}

fn unescape(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    line_no: usize,
) -> Result<char, BytecodeError> {
    let escaped = chars
        .next()
        .ok_or_else(|| syntax(line_no, "dangling escape".to_string()))?;
    let c = match escaped {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        '\\' => '\\',
        '"' => '"',
        '\'' => '\'',
        'u' => {
            if chars.next() != Some('{') {
                return Err(syntax(line_no, "malformed unicode escape".to_string()));
            }
            let mut hex = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                hex.push(c);
            }
            u32::from_str_radix(&hex, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| syntax(line_no, format!("invalid unicode escape '{}'", hex)))?
        }
        other => return Err(syntax(line_no, format!("unknown escape '\\{}'", other))),
    };
    Ok(c)
}

fn operand<'a>(tokens: &'a [Token], index: usize, line_no: usize) -> Result<&'a Token, BytecodeError> {
    tokens.get(index).ok_or_else(|| {
        syntax(
            line_no,
            format!("'{}' expects operand {}", tokens[0].text, index),
        )
    })
}

fn number(tokens: &[Token], index: usize, line_no: usize) -> Result<usize, BytecodeError> {
    let token = operand(tokens, index, line_no)?;
    token
        .text
        .parse()
        .map_err(|_| syntax(line_no, format!("expected a number, got '{}'", token.text)))
}

fn flag(tokens: &[Token], index: usize) -> bool {
    tokens
        .get(index)
        .map(|t| matches!(t.text.as_str(), "true" | "1" | "optional" | "optioned"))
        .unwrap_or(false)
}

fn literal(token: &Token, line_no: usize) -> Result<Literal, BytecodeError> {
    if token.quoted {
        return Ok(Literal::String(token.text.clone()));
    }
    let text = token.text.as_str();
    Ok(match text {
        "true" => Literal::Boolean(true),
        "false" => Literal::Boolean(false),
        "nil" | "null" => Literal::Null,
        _ => {
            if let Ok(i) = text.parse::<i64>() {
                Literal::Integer(i)
            } else if let Ok(f) = text.parse::<f64>() {
                Literal::Float(f)
            } else if text.is_empty() {
                return Err(syntax(line_no, "empty literal".to_string()));
            } else {
                Literal::String(text.to_string())
            }
        }
    })
}

fn parse_op(tokens: &[Token], line_no: usize) -> Result<Op, BytecodeError> {
    let name = tokens[0].text.as_str();
    let op = match name {
        "pop" => Op::Pop,
        "dup" => Op::Dup,
        "putself" => Op::PutSelf,
        "putnil" | "putnull" => Op::PutNull,
        "putboolean" => Op::PutBoolean(operand(tokens, 1, line_no)?.text == "true"),
        "putobject" => Op::PutObject(literal(operand(tokens, 1, line_no)?, line_no)?),
        "putstring" => Op::PutString(operand(tokens, 1, line_no)?.text.clone()),
        "putfloat" => {
            let token = operand(tokens, 1, line_no)?;
            Op::PutFloat(
                token
                    .text
                    .parse()
                    .map_err(|_| syntax(line_no, format!("expected a float, got '{}'", token.text)))?,
            )
        }
        "getconstant" => Op::GetConstant {
            name: operand(tokens, 1, line_no)?.text.clone(),
            is_namespace: flag(tokens, 2),
        },
        "setconstant" => Op::SetConstant {
            name: operand(tokens, 1, line_no)?.text.clone(),
        },
        "getlocal" => Op::GetLocal {
            depth: number(tokens, 1, line_no)?,
            index: number(tokens, 2, line_no)?,
        },
        "setlocal" => Op::SetLocal {
            depth: number(tokens, 1, line_no)?,
            index: number(tokens, 2, line_no)?,
            optional: flag(tokens, 3),
        },
        "getinstancevariable" => Op::GetInstanceVariable {
            name: operand(tokens, 1, line_no)?.text.clone(),
        },
        "setinstancevariable" => Op::SetInstanceVariable {
            name: operand(tokens, 1, line_no)?.text.clone(),
        },
        "newrange" => Op::NewRange,
        "newarray" => Op::NewArray {
            count: number(tokens, 1, line_no)?,
        },
        "newhash" => Op::NewHash {
            count: number(tokens, 1, line_no)?,
        },
        "expandarray" => Op::ExpandArray {
            count: number(tokens, 1, line_no)?,
        },
        "splatarray" => Op::SplatArray,
        "branchunless" => Op::BranchUnless {
            target: number(tokens, 1, line_no)?,
        },
        "branchif" => Op::BranchIf {
            target: number(tokens, 1, line_no)?,
        },
        "jump" => Op::Jump {
            target: number(tokens, 1, line_no)?,
        },
        "break" => Op::Break,
        "def_method" => Op::DefMethod {
            argc: number(tokens, 1, line_no)?,
        },
        "def_singleton_method" => Op::DefSingletonMethod {
            argc: number(tokens, 1, line_no)?,
        },
        "def_class" => {
            let subject = &operand(tokens, 1, line_no)?.text;
            let (kind, class_name) = subject
                .split_once(':')
                .ok_or_else(|| syntax(line_no, format!("malformed class subject '{}'", subject)))?;
            let is_module = match kind {
                "class" => false,
                "module" => true,
                other => return Err(syntax(line_no, format!("unknown class type '{}'", other))),
            };
            Op::DefClass {
                is_module,
                name: class_name.to_string(),
                has_super: tokens.len() > 2,
            }
        }
        "send" => parse_send(tokens, line_no)?,
        "invokeblock" => Op::InvokeBlock {
            argc: number(tokens, 1, line_no)?,
        },
        "getblock" => Op::GetBlock,
        "leave" => Op::Leave,
        other => {
            return Err(BytecodeError::UnknownInstruction {
                line: line_no,
                name: other.to_string(),
            })
        }
    };
    Ok(op)
}

fn parse_send(tokens: &[Token], line_no: usize) -> Result<Op, BytecodeError> {
    let name = operand(tokens, 1, line_no)?.text.clone();
    let argc = number(tokens, 2, line_no)?;
    let mut block = None;
    let mut arg_set = None;

    for token in &tokens[3..] {
        if let Some(id) = token.text.strip_prefix("block:") {
            block = Some(id.to_string());
        } else if let Some(list) = token.text.strip_prefix("args:") {
            let mut set = ArgSet::new();
            for entry in list.split(',') {
                let (arg_name, kind) = ArgSet::parse_entry(entry)
                    .ok_or_else(|| syntax(line_no, format!("invalid argument entry '{}'", entry)))?;
                set.push(arg_name, kind);
            }
            arg_set = Some(set);
        } else {
            return Err(syntax(
                line_no,
                format!("unexpected send operand '{}'", token.text),
            ));
        }
    }

    Ok(Op::Send {
        name,
        argc,
        block,
        arg_set,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArgKind;

    #[test]
    fn test_assemble_sets() {
        let program = assemble(
            "t.gb",
            "<Def:foo>\nparams: x y= k:\n0 getlocal 0 0\n1 leave\n<ProgramStart>\n0 putself\n1 putobject 10\n2 send foo 1 @3\n3 leave\n",
        )
        .unwrap();

        assert_eq!(program.sets.len(), 2);
        let def = &program.sets[0];
        assert_eq!(def.kind, SetKind::MethodDef);
        assert_eq!(def.name, "foo");
        assert_eq!(def.params.kinds, vec![ArgKind::Normal, ArgKind::Optioned, ArgKind::RequiredKeyword]);

        let entry = program.entry().unwrap();
        assert_eq!(entry.instructions[1].op, Op::PutObject(Literal::Integer(10)));
        assert_eq!(entry.instructions[2].line, 3);
        assert_eq!(entry.filename, "t.gb");
    }

    #[test]
    fn test_quoted_strings() {
        let program = assemble("t.gb", "<ProgramStart>\nputstring \"a \\\"b\\\" c\"\nputobject \"x y\"\nleave\n").unwrap();
        let entry = program.entry().unwrap();
        assert_eq!(entry.instructions[0].op, Op::PutString("a \"b\" c".to_string()));
        assert_eq!(
            entry.instructions[1].op,
            Op::PutObject(Literal::String("x y".to_string()))
        );
    }

    #[test]
    fn test_send_operands() {
        let program = assemble(
            "t.gb",
            "<ProgramStart>\nsend each 0 block:2\nsend foo 2 args:_,name:\nleave\n",
        )
        .unwrap();
        let entry = program.entry().unwrap();
        match &entry.instructions[0].op {
            Op::Send { block, .. } => assert_eq!(block.as_deref(), Some("2")),
            other => panic!("unexpected {:?}", other),
        }
        match &entry.instructions[1].op {
            Op::Send { arg_set, .. } => {
                let set = arg_set.as_ref().unwrap();
                assert_eq!(set.kinds, vec![ArgKind::Normal, ArgKind::RequiredKeyword]);
                assert_eq!(set.names[1], "name");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_def_class_operands() {
        let program = assemble(
            "t.gb",
            "<ProgramStart>\ndef_class module:Foo\ndef_class class:Bar Foo::Bar\nleave\n",
        )
        .unwrap();
        let entry = program.entry().unwrap();
        assert_eq!(
            entry.instructions[0].op,
            Op::DefClass {
                is_module: true,
                name: "Foo".to_string(),
                has_super: false
            }
        );
        assert_eq!(
            entry.instructions[1].op,
            Op::DefClass {
                is_module: false,
                name: "Bar".to_string(),
                has_super: true
            }
        );
    }

    #[test]
    fn test_instance_variable_operands() {
        let program = assemble(
            "t.gb",
            "<ProgramStart>\nputobject 1\nsetinstancevariable @x @3\ngetinstancevariable @x\nleave\n",
        )
        .unwrap();
        let entry = program.entry().unwrap();
        assert_eq!(
            entry.instructions[1].op,
            Op::SetInstanceVariable {
                name: "@x".to_string()
            }
        );
        assert_eq!(entry.instructions[1].line, 3);
        assert_eq!(
            entry.instructions[2].op,
            Op::GetInstanceVariable {
                name: "@x".to_string()
            }
        );
        assert_eq!(entry.instructions[2].line, 0);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            assemble("t.gb", "putself\n"),
            Err(BytecodeError::MissingLabel(1))
        ));
        assert!(matches!(
            assemble("t.gb", "<ProgramStart>\nfrobnicate\n"),
            Err(BytecodeError::UnknownInstruction { line: 2, .. })
        ));
        assert!(matches!(
            assemble("t.gb", "<ProgramStart>\ngetlocal 0\n"),
            Err(BytecodeError::Syntax { line: 2, .. })
        ));
        assert!(matches!(
            assemble("t.gb", "<Nope:x>\n"),
            Err(BytecodeError::Syntax { line: 1, .. })
        ));
    }

    #[test]
    fn test_listing_roundtrip() {
        let source = "<Block:0>\n0 getlocal 1 0\n1 putobject 1\n2 send + 1\n3 setlocal 1 0\n4 leave\n<ProgramStart>\n0 putobject 0\n1 setlocal 0 0\n2 putobject 3\n3 send times 0 block:0\n4 pop\n5 getlocal 0 0\n6 leave\n";
        let program = assemble("t.gb", source).unwrap();
        assert_eq!(program.to_string(), source);
    }
}
