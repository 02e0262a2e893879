use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::exit;

pub const DEFAULT_OBJCOPY: &str = "/usr/bin/avr-objcopy";
pub const DEFAULT_OBJDUMP: &str = "/usr/bin/avr-objdump";

#[derive(clap::Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// ELF executable to convert
    #[arg(value_name = "elf-file(in)")]
    pub elf_file: PathBuf,

    /// Raw binary image to write
    #[arg(value_name = "bin-file(out)")]
    pub bin_file: PathBuf,

    /// Cross-reference listing to write
    #[arg(value_name = "xref-file(out)")]
    pub xref_file: PathBuf,

    /// objcopy used to extract the binary image
    #[arg(long, env = "AVR_OBJCOPY", default_value = DEFAULT_OBJCOPY)]
    pub objcopy: PathBuf,

    /// objdump used to list the symbol table
    #[arg(long, env = "AVR_OBJDUMP", default_value = DEFAULT_OBJDUMP)]
    pub objdump: PathBuf,

    /// Fail if objcopy or objdump fails
    #[arg(long)]
    pub strict: bool,

    /// Increase message verbosity
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Silence all log output, including output of objcopy
    #[arg(short, long)]
    pub quiet: bool,
}

pub fn usage(program: &str) -> String {
    format!("usage: {program} <elf-file(in)> <bin-file(out)> <xref-file(out)>")
}

/// Parse the process arguments. Anything but `--help`/`--version` that clap
/// rejects prints the usage line on stdout and exits with status 1.
pub fn parse_args() -> Args {
    let argv: Vec<OsString> = std::env::args_os().collect();
    let program = argv
        .first()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());

    match try_parse_from(argv) {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(_) => {
            println!("{}", usage(&program));
            exit(1);
        }
    }
}

/// Like [`Args::try_parse_from`], but a hyphen-prefixed argument that is not
/// one of our flags counts as a file name.
pub fn try_parse_from(argv: Vec<OsString>) -> Result<Args, clap::Error> {
    let mut cmd = Args::command();
    cmd.build();
    Args::try_parse_from(separate_positionals(&cmd, argv))
}

/// Reorder `argv` as `program [flags..] -- [positionals..]`.
fn separate_positionals(cmd: &clap::Command, argv: Vec<OsString>) -> Vec<OsString> {
    let mut argv = argv.into_iter();
    let mut flags: Vec<OsString> = argv.next().into_iter().collect();
    let mut positionals = vec![];

    while let Some(arg) = argv.next() {
        if arg == "--" {
            positionals.extend(argv.by_ref());
            break;
        }
        match flag_shape(cmd, &arg) {
            Some(FlagShape::Complete) => flags.push(arg),
            Some(FlagShape::NeedsValue) => {
                flags.push(arg);
                flags.extend(argv.next());
            }
            None => positionals.push(arg),
        }
    }

    flags.push(OsString::from("--"));
    flags.extend(positionals);
    flags
}

enum FlagShape {
    Complete,
    /// The value is the next argument.
    NeedsValue,
}

fn flag_shape(cmd: &clap::Command, arg: &OsString) -> Option<FlagShape> {
    let arg = arg.to_str()?;
    if let Some(long) = arg.strip_prefix("--") {
        let (name, inline_value) = match long.split_once('=') {
            Some((name, _)) => (name, true),
            None => (long, false),
        };
        let flag = cmd.get_arguments().find(|a| a.get_long() == Some(name))?;
        return Some(if flag.get_action().takes_values() && !inline_value {
            FlagShape::NeedsValue
        } else {
            FlagShape::Complete
        });
    }

    let cluster = arg.strip_prefix('-')?;
    for (i, c) in cluster.char_indices() {
        let flag = cmd.get_arguments().find(|a| a.get_short() == Some(c))?;
        if flag.get_action().takes_values() {
            let attached = i + c.len_utf8() < cluster.len();
            return Some(if attached {
                FlagShape::Complete
            } else {
                FlagShape::NeedsValue
            });
        }
    }
    (!cluster.is_empty()).then_some(FlagShape::Complete)
}
