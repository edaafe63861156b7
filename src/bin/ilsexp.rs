// S-expression flow graph serialization (ilsexp)
//
//  Copyright (C) 2014-2022 Ryan Specialty Group, LLC.
//
//  This file is part of ilsexp.
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Flow graph S-expression tool.
//!
//! `ilsexp` reads a file holding a flow graph in its S-expression text
//!   form,
//!     optionally preceded by a `(Program …)` form declaring the classes,
//!     fields,
//!     and functions that the graph refers to,
//!   and then does one of the following depending on `--emit`:
//!
//!   - `sexp` re-prints every form of the file;
//!   - `graph` deserializes the flow graph and prints its canonical
//!       serialization;
//!   - `roundtrip` runs the round-trip self-test and prints its report.
//!
//! Errors are rendered against the input file with the offending
//!   S-expression underlined.

extern crate ilsexp;

use getopts::{Fail, Options};
use ilsexp::{
    diagnose::{
        AnnotatedSpan, BufSpanResolver, Diagnostic, Reporter, VisualReporter,
    },
    global,
    il::{self, DeserializeError},
    program::{LoadError, Program},
    roundtrip::{round_trip, RoundTripError},
    sexp::{ParseError, SExp, SExpParser},
    span::Context,
    sym::GlobalSymbolResolve,
};
use std::{env, error::Error, fmt::Display, fs};

/// Output requested by `--emit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emit {
    Sexp,
    Graph,
    RoundTrip,
}

/// Types of commands
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run {
        input: String,
        emit: Emit,
        width: usize,
    },
    Usage,
}

/// Entrypoint
pub fn main() {
    let args: Vec<String> = env::args().collect();
    let program = &args[0];
    let opts = get_opts();
    let usage = opts.usage(&format!("Usage: {} [OPTIONS] INPUT", program));

    match parse_options(opts, args) {
        Ok(Command::Run { input, emit, width }) => {
            let src = match fs::read_to_string(&input) {
                Ok(src) => src,
                Err(e) => {
                    eprintln!("error: cannot read `{input}`: {e}");
                    std::process::exit(exitcode::NOINPUT);
                }
            };

            let ctx = Context::from(input.as_str());

            match run(&src, ctx, emit, width) {
                Ok((out, success)) => {
                    println!("{out}");

                    if !success {
                        std::process::exit(exitcode::DATAERR);
                    }
                }
                Err(e) => {
                    let mut reporter =
                        VisualReporter::new(BufSpanResolver::new(src.as_bytes(), ctx));

                    // Rendering to a string first keeps the report from
                    //   interleaving with other output.
                    let report = reporter.render(&e).to_string();
                    eprintln!("{report}\nfatal: failed to process `{input}`");

                    std::process::exit(exitcode::DATAERR);
                }
            }
        }
        Ok(Command::Usage) => {
            println!("{}", usage);
            std::process::exit(exitcode::OK);
        }
        Err(e) => {
            eprintln!("{}", e);
            println!("{}", usage);
            std::process::exit(exitcode::USAGE);
        }
    }
}

/// Process the source `src`,
///   producing the text to print and whether the result indicates
///   success.
fn run(
    src: &str,
    ctx: Context,
    emit: Emit,
    width: usize,
) -> Result<(String, bool), IlsexpError> {
    let forms = SExpParser::new(src, ctx).parse_all()?;

    if emit == Emit::Sexp {
        let out = forms
            .iter()
            .map(|form| form.serialize_to(width))
            .collect::<Vec<_>>()
            .join("\n");

        return Ok((out, true));
    }

    let (program, graph) = split_input(&forms)?;

    match emit {
        Emit::Graph => {
            let graph = il::deserialize(&program, graph)?;
            Ok((il::serialize(&program, &graph).serialize_to(width), true))
        }

        _ => {
            let report = round_trip(&program, graph);

            // Only failures on the input itself can be shown in context.
            if let Some(RoundTripError::Deserialize { error, .. }) = &report.error {
                if report.serialized.is_none() {
                    return Err(error.clone().into());
                }
            }

            Ok((report.to_sexp().serialize_to(width), report.is_success()))
        }
    }
}

/// Program declaration (if any) and flow graph of the input.
fn split_input(forms: &[SExp]) -> Result<(Program, &SExp), IlsexpError> {
    match forms {
        [graph] => Ok((Program::new(), graph)),
        [decl, graph] if is_program(decl) => {
            Ok((Program::from_sexp(decl)?, graph))
        }
        _ => Err(IlsexpError::ExpectedGraph(forms.len())),
    }
}

fn is_program(sexp: &SExp) -> bool {
    sexp.tag().map_or(false, |tag| tag.lookup_str() == "Program")
}

/// Get 'Options'
fn get_opts() -> Options {
    let mut opts = Options::new();
    opts.optopt("", "emit", "set output type", "sexp|graph|roundtrip");
    opts.optopt("w", "width", "set print width", "N");
    opts.optflag("h", "help", "print this help menu");

    opts
}

/// Option parser
fn parse_options(opts: Options, args: Vec<String>) -> Result<Command, Fail> {
    let matches = opts.parse(&args[1..])?;

    if matches.opt_present("h") {
        return Ok(Command::Usage);
    }

    let input = match matches.free.len() {
        0 => return Err(Fail::OptionMissing(String::from("INPUT"))),
        1 => matches.free[0].clone(),
        _ => return Err(Fail::UnrecognizedOption(matches.free[1].clone())),
    };

    let emit = match matches.opt_str("emit").as_deref() {
        None | Some("roundtrip") => Emit::RoundTrip,
        Some("sexp") => Emit::Sexp,
        Some("graph") => Emit::Graph,
        Some(_) => {
            return Err(Fail::ArgumentMissing(String::from(
                "--emit sexp|graph|roundtrip",
            )))
        }
    };

    let width = match matches.opt_str("w") {
        Some(n) => match n.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => return Err(Fail::UnexpectedArgument(format!("--width {n}"))),
        },
        None => global::DEFAULT_PRINT_WIDTH,
    };

    Ok(Command::Run { input, emit, width })
}

/// Tool (`ilsexp`) error.
#[derive(Debug)]
pub enum IlsexpError {
    Parse(ParseError),
    Load(LoadError),
    Deserialize(DeserializeError),

    /// Input did not consist of a flow graph,
    ///   optionally preceded by a program declaration;
    ///     holds the number of forms found.
    ExpectedGraph(usize),
}

impl From<ParseError> for IlsexpError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<LoadError> for IlsexpError {
    fn from(e: LoadError) -> Self {
        Self::Load(e)
    }
}

impl From<DeserializeError> for IlsexpError {
    fn from(e: DeserializeError) -> Self {
        Self::Deserialize(e)
    }
}

impl Display for IlsexpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(e) => Display::fmt(e, f),
            Self::Load(e) => Display::fmt(e, f),
            Self::Deserialize(e) => Display::fmt(e, f),
            Self::ExpectedGraph(n) => write!(
                f,
                "expected a flow graph optionally preceded by a program \
                   declaration, but found {n} form(s)"
            ),
        }
    }
}

impl Error for IlsexpError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Load(e) => Some(e),
            Self::Deserialize(e) => Some(e),
            Self::ExpectedGraph(_) => None,
        }
    }
}

impl Diagnostic for IlsexpError {
    fn describe(&self) -> Vec<AnnotatedSpan> {
        match self {
            Self::Parse(e) => e.describe(),
            Self::Load(e) => e.describe(),
            Self::Deserialize(e) => e.describe(),
            Self::ExpectedGraph(_) => vec![],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, Fail> {
        let args = std::iter::once("program")
            .chain(args.iter().copied())
            .map(String::from)
            .collect();

        parse_options(get_opts(), args)
    }

    #[test]
    fn parse_options_help() {
        assert_eq!(Ok(Command::Usage), parse(&["-h"]));
        assert_eq!(Ok(Command::Usage), parse(&["--help"]));
    }

    #[test]
    fn parse_options_invalid() {
        match parse(&["-q"]) {
            Err(Fail::UnrecognizedOption(_)) => {}
            _ => panic!("Invalid option not caught"),
        }
    }

    #[test]
    fn parse_options_missing_input() {
        match parse(&[]) {
            Err(Fail::OptionMissing(_)) => {}
            _ => panic!("Missing input not caught"),
        }
    }

    #[test]
    fn parse_options_defaults() {
        assert_eq!(
            Ok(Command::Run {
                input: "foo.sexp".into(),
                emit: Emit::RoundTrip,
                width: global::DEFAULT_PRINT_WIDTH,
            }),
            parse(&["foo.sexp"]),
        );
    }

    #[test]
    fn parse_options_emit_and_width() {
        assert_eq!(
            Ok(Command::Run {
                input: "foo.sexp".into(),
                emit: Emit::Graph,
                width: 40,
            }),
            parse(&["--emit", "graph", "-w", "40", "foo.sexp"]),
        );

        match parse(&["--emit", "xmlo", "foo.sexp"]) {
            Err(Fail::ArgumentMissing(_)) => {}
            other => panic!("Invalid emit not caught: {other:?}"),
        }

        match parse(&["--width", "0", "foo.sexp"]) {
            Err(Fail::UnexpectedArgument(_)) => {}
            other => panic!("Invalid width not caught: {other:?}"),
        }
    }

    #[test]
    fn run_emits_canonical_graph() {
        let src = r#"
            (Program (Library "file:///main.dart" (Function main)))
            (FlowGraph "file:///main.dart:::main"
              (Constants (def v0 (Constant null)))
              (Entries (Normal B1 { try_index -1 }))
              (Block B1 (Return v0)))
        "#;

        let (out, success) = run(src, Context::from("test.sexp"), Emit::Graph, 200)
            .unwrap();

        assert!(success);
        assert_eq!(
            r#"(FlowGraph "file:///main.dart:::main" (Constants (def v0 (Constant null))) (Entries (Normal B1)) (Block B1 (Return v0)))"#,
            out
        );
    }

    #[test]
    fn run_requires_graph() {
        let src = "(Program) (Program) (Program)";

        match run(src, Context::from("test.sexp"), Emit::Graph, 80) {
            Err(IlsexpError::ExpectedGraph(3)) => {}
            other => panic!("unexpected {other:?}"),
        }
    }
}
