use crate::args::Args;
use crate::tool::{Tool, ToolOutcome};
use crate::xref::{XrefStats, XrefWriter};
use eyre::{Context, Result};
use std::ffi::OsString;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Extract the binary image, then the cross-reference listing. Returns
/// whether both tools succeeded.
pub fn convert(args: &Args) -> Result<bool> {
    let objcopy = Tool::new("objcopy", &args.objcopy);
    let objdump = Tool::new("objdump", &args.objdump);

    let copied = extract_binary(&objcopy, &args.elf_file, &args.bin_file)?;
    report(&objcopy, &copied);

    let (dumped, stats) = extract_symbols(&objdump, &args.elf_file, &args.xref_file)?;
    report(&objdump, &dumped);

    tracing::info!(
        "wrote {} labels to {} ({} of {} lines were symbols)",
        stats.entries,
        console::style(args.xref_file.display()).green(),
        stats.symbols,
        stats.lines,
    );

    Ok(copied.is_success() && dumped.is_success())
}

pub fn extract_binary(objcopy: &Tool, elf: &Path, bin: &Path) -> Result<ToolOutcome> {
    let args = vec![
        OsString::from("-I"),
        OsString::from("elf32-avr"),
        OsString::from("-O"),
        OsString::from("binary"),
        elf.as_os_str().to_os_string(),
        bin.as_os_str().to_os_string(),
    ];
    objcopy.run(args)
}

/// The listing is created before objdump starts, so it exists (possibly
/// empty) even when objdump cannot run.
pub fn extract_symbols(
    objdump: &Tool,
    elf: &Path,
    xref: &Path,
) -> Result<(ToolOutcome, XrefStats)> {
    let file = File::create(xref)
        .wrap_err_with(|| format!("failed to create {}", xref.display()))?;
    let mut writer = XrefWriter::new(BufWriter::new(file));

    let args = vec![
        OsString::from("-t"),
        OsString::from("-C"),
        elf.as_os_str().to_os_string(),
    ];
    let outcome = objdump.stream(args, |line| {
        writer
            .feed(line)
            .wrap_err_with(|| format!("failed to write {}", xref.display()))
    })?;
    let stats = writer
        .finish()
        .wrap_err_with(|| format!("failed to write {}", xref.display()))?;
    Ok((outcome, stats))
}

fn report(tool: &Tool, outcome: &ToolOutcome) {
    if outcome.is_success() {
        tracing::debug!("{} {outcome}", tool.name());
    } else {
        tracing::warn!(
            "{} ({}) {outcome}",
            tool.name(),
            tool.program().display()
        );
    }
}
