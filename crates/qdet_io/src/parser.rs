//! Reader and writer for the stim circuit text format.
//!
//! Covers the subset the engine consumes: gate, reset, measurement and noise
//! lines with optional parenthesised arguments, `!q` and `rec[-k]` targets,
//! `TICK`, `QUBIT_COORDS`, `SHIFT_COORDS`, `DETECTOR`, `OBSERVABLE_INCLUDE`,
//! `#` comments and `REPEAT n { ... }` blocks, which stay nested. Unknown
//! instruction names are kept as unresolved operations so that the core can
//! report them with their position.

use anyhow::{Result, anyhow, bail};
use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case, take_while1};
use nom::character::complete::{char, i64 as signed, space0, space1, u32 as unsigned, u64 as count};
use nom::combinator::{all_consuming, map, opt};
use nom::multi::{many0, separated_list0};
use nom::number::complete::double;
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use qdet_core::circuit::{Circuit, Instruction, Operation, Target};
use std::fmt::Write;

/// One source line after comment stripping.
struct Line<'a> {
    number: usize,
    text: &'a str,
}

/// Parses stim circuit text into a [`Circuit`].
///
/// # Arguments
///
/// * `text` - Circuit source
///
/// # Returns
///
/// The circuit with `REPEAT` blocks kept as [`Instruction::Repeat`], or an
/// error naming the first offending line.
pub fn parse_circuit(text: &str) -> Result<Circuit> {
    let lines: Vec<Line> = text
        .lines()
        .enumerate()
        .map(|(i, raw)| Line {
            number: i + 1,
            text: raw.split('#').next().unwrap_or_default().trim(),
        })
        .filter(|line| !line.text.is_empty())
        .collect();

    let mut pos = 0;
    let instructions = parse_block(&lines, &mut pos, None)?;
    Ok(Circuit::from_instructions(instructions))
}

fn parse_block(lines: &[Line], pos: &mut usize, opened_at: Option<usize>) -> Result<Vec<Instruction>> {
    let mut out = Vec::new();
    while let Some(line) = lines.get(*pos) {
        *pos += 1;
        if line.text == "}" {
            return match opened_at {
                Some(_) => Ok(out),
                None => bail!("line {}: unmatched `}}`", line.number),
            };
        }
        if let Ok((_, count)) = repeat_header(line.text) {
            if count == 0 {
                bail!("line {}: REPEAT count must be positive", line.number);
            }
            let body = parse_block(lines, pos, Some(line.number))?;
            out.push(Instruction::Repeat {
                count,
                body: Circuit::from_instructions(body),
            });
            continue;
        }
        let (_, (name, args, targets)) = all_consuming(terminated(instruction, space0))(line.text)
            .map_err(|e| anyhow!("line {}: cannot parse `{}`: {e}", line.number, line.text))?;
        lower(name, args, targets, &mut out).map_err(|e| anyhow!("line {}: {e}", line.number))?;
    }
    match opened_at {
        Some(number) => bail!("line {number}: REPEAT block is never closed"),
        None => Ok(out),
    }
}

fn repeat_header(input: &str) -> IResult<&str, u64> {
    all_consuming(delimited(
        pair(tag_no_case("REPEAT"), space1),
        count,
        pair(space0, char('{')),
    ))(input)
}

fn name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

fn args(input: &str) -> IResult<&str, Vec<f64>> {
    delimited(
        pair(char('('), space0),
        separated_list0(delimited(space0, char(','), space0), double),
        pair(space0, char(')')),
    )(input)
}

fn target(input: &str) -> IResult<&str, Target> {
    alt((
        map(delimited(tag("rec["), signed, char(']')), Target::Record),
        map(pair(opt(char('!')), unsigned), |(bang, index)| Target::Qubit {
            index,
            inverted: bang.is_some(),
        }),
    ))(input)
}

fn instruction(input: &str) -> IResult<&str, (&str, Vec<f64>, Vec<Target>)> {
    tuple((
        name,
        map(opt(args), Option::unwrap_or_default),
        many0(preceded(space1, target)),
    ))(input)
}

fn records(targets: &[Target]) -> Result<Vec<i64>> {
    targets
        .iter()
        .map(|t| match t {
            Target::Record(offset) => Ok(*offset),
            Target::Qubit { index, .. } => Err(anyhow!("expected a rec[-k] target, found qubit {index}")),
        })
        .collect()
}

fn lower(name: &str, args: Vec<f64>, targets: Vec<Target>, out: &mut Vec<Instruction>) -> Result<()> {
    match name.to_ascii_uppercase().as_str() {
        "TICK" => {
            if !targets.is_empty() {
                bail!("TICK takes no targets");
            }
            out.push(Instruction::Tick);
        }
        "QUBIT_COORDS" => {
            for t in targets {
                let Target::Qubit { index, .. } = t else {
                    bail!("QUBIT_COORDS takes qubit targets");
                };
                out.push(Instruction::QubitCoords {
                    qubit: index,
                    coords: args.clone(),
                });
            }
        }
        "SHIFT_COORDS" => out.push(Instruction::ShiftCoords(args)),
        "DETECTOR" => out.push(Instruction::Detector {
            coords: args,
            records: records(&targets)?,
        }),
        "OBSERVABLE_INCLUDE" => {
            let index = match args.as_slice() {
                [k] if *k >= 0.0 && k.fract() == 0.0 => *k as u32,
                _ => bail!("OBSERVABLE_INCLUDE needs one non-negative integer argument"),
            };
            out.push(Instruction::ObservableInclude {
                index,
                records: records(&targets)?,
            });
        }
        _ => out.push(Instruction::Operation(Operation::named(name, targets, args))),
    }
    Ok(())
}

/// Renders `circuit` in canonical stim text, one instruction per line and
/// `REPEAT` bodies indented by four spaces.
pub fn write_circuit(circuit: &Circuit) -> String {
    let mut text = String::new();
    write_block(&mut text, circuit, 0);
    text
}

fn write_block(text: &mut String, circuit: &Circuit, depth: usize) {
    let indent = "    ".repeat(depth);
    for instruction in circuit.instructions() {
        text.push_str(&indent);
        let _ = match instruction {
            Instruction::Repeat { count, body } => {
                let _ = writeln!(text, "REPEAT {count} {{");
                write_block(text, body, depth + 1);
                writeln!(text, "{indent}}}")
            }
            Instruction::Tick => writeln!(text, "TICK"),
            Instruction::Operation(op) => {
                writeln!(text, "{}{}{}", op.name, fmt_args(&op.args), fmt_targets(&op.targets))
            }
            Instruction::QubitCoords { qubit, coords } => {
                writeln!(text, "QUBIT_COORDS{} {qubit}", fmt_args(coords))
            }
            Instruction::ShiftCoords(delta) => writeln!(text, "SHIFT_COORDS{}", fmt_args(delta)),
            Instruction::Detector { coords, records } => {
                writeln!(text, "DETECTOR{}{}", fmt_args(coords), fmt_records(records))
            }
            Instruction::ObservableInclude { index, records } => {
                writeln!(text, "OBSERVABLE_INCLUDE({index}){}", fmt_records(records))
            }
        };
    }
}

fn fmt_args(args: &[f64]) -> String {
    if args.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = args.iter().map(f64::to_string).collect();
    format!("({})", parts.join(", "))
}

fn fmt_targets(targets: &[Target]) -> String {
    targets
        .iter()
        .map(|t| match t {
            Target::Qubit { index, inverted: true } => format!(" !{index}"),
            Target::Qubit { index, inverted: false } => format!(" {index}"),
            Target::Record(offset) => format!(" rec[{offset}]"),
        })
        .collect()
}

fn fmt_records(records: &[i64]) -> String {
    records.iter().map(|r| format!(" rec[{r}]")).collect()
}
