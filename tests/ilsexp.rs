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

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn data(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn invalid_argument() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("ilsexp")?;
    cmd.arg("-q");
    cmd.assert()
        .failure()
        .code(exitcode::USAGE)
        .stderr(predicate::str::contains("Unrecognized option:"));

    Ok(())
}

#[test]
fn missing_input_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("ilsexp")?;
    cmd.arg("--emit").arg("graph");
    cmd.assert()
        .failure()
        .code(exitcode::USAGE)
        .stderr(predicate::str::contains("INPUT"));

    Ok(())
}

#[test]
fn invalid_emit() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("ilsexp")?;
    cmd.arg(data("diamond.sexp"));
    cmd.arg("--emit").arg("xmlo");
    cmd.assert()
        .failure()
        .code(exitcode::USAGE)
        .stderr(predicate::str::contains("--emit sexp|graph|roundtrip"));

    Ok(())
}

#[test]
fn input_file_does_not_exist() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("ilsexp")?;
    cmd.arg("foobar.sexp");
    cmd.assert()
        .failure()
        .code(exitcode::NOINPUT)
        .stderr(predicate::str::contains("cannot read `foobar.sexp`"));

    Ok(())
}

#[test]
fn emit_sexp_reprints_forms() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("ilsexp")?;
    cmd.arg(data("diamond.sexp"));
    cmd.arg("--emit").arg("sexp").arg("-w").arg("1000");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            r#"(Program (Library "file:///main.dart" "#,
        ))
        .stdout(predicate::str::contains(
            "(CheckStackOverflow { deopt_id 2, stack_depth 0 })",
        ));

    Ok(())
}

#[test]
fn emit_graph_is_canonical() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("ilsexp")?;
    cmd.arg(data("diamond.sexp"));
    cmd.arg("--emit").arg("graph").arg("--width").arg("1000");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "(Block B3 { block_type Target } (Goto B4)) \
             (Block B2 { block_type Target } (Goto B4))",
        ))
        .stdout(predicate::str::contains("(CheckStackOverflow { deopt_id 2 })"))
        .stdout(predicate::str::contains("Program").not());

    Ok(())
}

#[test]
fn roundtrip_succeeds() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("ilsexp")?;
    cmd.arg(data("diamond.sexp"));
    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("(RoundTrip"))
        .stdout(predicate::str::contains("success true"));

    Ok(())
}

#[test]
fn roundtrip_reports_unhandled() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("ilsexp")?;
    cmd.arg(data("unhandled.sexp"));
    cmd.arg("--emit").arg("roundtrip");
    cmd.assert()
        .failure()
        .code(exitcode::DATAERR)
        .stdout(predicate::str::contains("success false"))
        .stdout(predicate::str::contains("unhandled ((GuardFieldClass 2))"));

    Ok(())
}

#[test]
fn deserialize_error_rendered() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("ilsexp")?;
    cmd.arg(data("unreachable.sexp"));
    cmd.arg("--emit").arg("graph");
    cmd.assert()
        .failure()
        .code(exitcode::DATAERR)
        .stderr(predicate::str::contains(
            "error: block unreachable in flow graph",
        ))
        .stderr(predicate::str::contains("unreachable.sexp:7:"))
        .stderr(predicate::str::contains("no entry or branch reaches B2"))
        .stderr(predicate::str::contains("fatal: failed to process"));

    Ok(())
}

#[test]
fn parse_error_rendered() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("ilsexp")?;
    cmd.arg(data("unterminated.sexp"));
    cmd.assert()
        .failure()
        .code(exitcode::DATAERR)
        .stderr(predicate::str::contains("unterminated S-expression list"))
        .stderr(predicate::str::contains("list starts here"));

    Ok(())
}
