// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The `wvm` runner: load, decode and instantiate a module, optionally
//! invoking an exported function. Exit code 0 on success, non-zero on any
//! failure.

use anyhow::{Context, bail};
use std::process::ExitCode;
use wvm::{Instance, Module, Val};

const USAGE: &str = "\
usage: wvm run <wasmfile> [--invoke <export> [arg...]]

options:
    --invoke <export>   call the named export after instantiation;
                        arguments are i64 literals, results are printed
    -h, --help          print this help
";

fn main() -> ExitCode {
    init_logging();

    match run(std::env::args().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("wvm: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> anyhow::Result<()> {
    let mut args = args.into_iter();

    match args.next().as_deref() {
        Some("run") => {}
        Some("-h") | Some("--help") => {
            print!("{USAGE}");
            return Ok(());
        }
        Some(cmd) => bail!("unknown command {cmd:?}\n{USAGE}"),
        None => bail!("missing command\n{USAGE}"),
    }

    let Some(path) = args.next() else {
        bail!("missing <wasmfile>\n{USAGE}");
    };

    let mut invoke: Option<(String, Vec<Val>)> = None;
    if let Some(flag) = args.next() {
        if flag != "--invoke" {
            bail!("unknown option {flag:?}\n{USAGE}");
        }
        let Some(export) = args.next() else {
            bail!("--invoke needs an export name\n{USAGE}");
        };
        let params = args
            .map(|arg| {
                arg.parse::<i64>()
                    .map(Val::I64)
                    .with_context(|| format!("argument {arg:?} is not an integer"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        invoke = Some((export, params));
    }

    let bytes = std::fs::read(&path).with_context(|| format!("reading {path}"))?;
    let module = Module::decode(bytes).with_context(|| format!("decoding {path}"))?;
    if let Some(name) = module.name() {
        tracing::info!("module name: {name}");
    }

    let instance = Instance::new(module);
    instance.instantiate(&[]).context("instantiating")?;

    if let Some((export, params)) = invoke {
        // arguments were parsed as i64; narrow them to the signature
        let func = instance
            .get_func(&export)
            .with_context(|| format!("no exported function {export:?}"))?;
        let params: Vec<Val> = func
            .ty()
            .params()
            .iter()
            .zip(params)
            .map(|(ty, val)| narrow(*ty, val))
            .collect();

        let results = instance
            .invoke(&export, &params)
            .with_context(|| format!("invoking {export:?}"))?;
        for result in results {
            println!("{result}");
        }
    }

    Ok(())
}

fn narrow(ty: wvm::ValueType, val: Val) -> Val {
    let raw = val.unwrap_i64();
    match ty {
        wvm::ValueType::I32 => Val::I32(raw as i32),
        wvm::ValueType::F32 => Val::F32(raw as u32),
        wvm::ValueType::F64 => Val::F64(raw as u64),
        _ => Val::I64(raw),
    }
}

fn init_logging() {
    use std::io::IsTerminal;
    use tracing_subscriber::{EnvFilter, fmt};

    let use_ansi = std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let subscriber = fmt::fmt()
        .with_env_filter(filter)
        .with_ansi(use_ansi)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
