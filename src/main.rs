use std::path::PathBuf;

use anyhow::{Context, Result};
use rustyline::{error::ReadlineError, Editor};
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

use ddql::{parse_program, parse_query, Prelude, TypeCatalog};

#[derive(Debug, StructOpt)]
#[structopt(name = "ddql", about = "Compiles relational rules into DDlog")]
struct Opt {
    /// Relation declarations and rules available to queries. Skipped if the
    /// default file does not exist.
    #[structopt(long, parse(from_os_str))]
    prelude: Option<PathBuf>,

    /// Print the whole prelude as a DDlog program and exit
    #[structopt(long)]
    emit_program: bool,
}

const DEFAULT_PRELUDE_FILENAME: &str = "prelude.ddql";

fn load_prelude(opt: &Opt) -> Result<Prelude> {
    let code = match &opt.prelude {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => match std::fs::read_to_string(DEFAULT_PRELUDE_FILENAME) {
            Ok(code) => code,
            Err(_) => return Ok(Prelude::default()),
        },
    };
    let program = parse_program(&code)?;
    tracing::info!(
        relations = program.relations.len(),
        rules = program.rules.len(),
        "loaded prelude"
    );
    Ok(Prelude::from(program))
}

fn handle_input(prelude: &Prelude, code: &str) -> Result<String> {
    let query = parse_query(code)?;
    let program = prelude.compile(query)?;
    Ok(program.to_ddlog())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opt = Opt::from_args();
    if TypeCatalog::default().install().is_err() {
        tracing::warn!("type catalog was already installed");
    }
    let prelude = load_prelude(&opt)?;

    if opt.emit_program {
        print!("{}", prelude.compile_program()?.to_ddlog());
        return Ok(());
    }

    let mut editor = Editor::<()>::new();
    loop {
        let readline = editor.readline("> ");
        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                editor.add_history_entry(line.as_str());

                // TODO: multiline inputs
                match handle_input(&prelude, &line) {
                    Ok(ddlog) => {
                        print!("{}", ddlog);
                    }
                    Err(e) => {
                        println!("Error: {:#}", e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {}", err);
                break;
            }
        }
    }

    Ok(())
}
