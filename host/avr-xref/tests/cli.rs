#![cfg(unix)]

use avr_xref::xref::{read_xref, XrefKind};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Output;

const BIN: &str = env!("CARGO_BIN_EXE_avr-xref");

const SYMBOL_TABLE: &str = "\
firmware.elf:     file format elf32-avr

SYMBOL TABLE:
00000000 l    d  .text\t00000000 .text
00800100 l    d  .data\t00000000 .data
00000000 l    df *ABS*\t00000000 main.c
0000003e l       *ABS*\t00000000 __SP_H__
00000068 l       .text\t00000000 .do_copy_data_loop
00000100 g     F .text\t00000010 myFunc
00000112 g     F .text\t0000001a ns::Blink::toggle(unsigned char)
00800100 g     O .data\t00000002 counter
00000000 g       .text\t00000000 __vectors
";

/// Scratch directory with fake `avr-objcopy`/`avr-objdump` scripts that log
/// their invocations to `calls.log`.
struct Scratch {
    dir: PathBuf,
}

impl Scratch {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("avr-xref-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("failed to create scratch directory");
        fs::write(dir.join("firmware.elf"), b"\x7fELF").unwrap();
        fs::write(dir.join("symbols.txt"), SYMBOL_TABLE).unwrap();

        let scratch = Self { dir };
        scratch.script(
            "avr-objcopy",
            "echo \"objcopy $*\" >> \"$(dirname \"$0\")/calls.log\"\nprintf 'BIN:%s' \"$5\" > \"$6\"\n",
        );
        scratch.script(
            "avr-objdump",
            "echo \"objdump $*\" >> \"$(dirname \"$0\")/calls.log\"\ncat \"$(dirname \"$0\")/symbols.txt\"\n",
        );
        scratch
    }

    fn script(&self, name: &str, body: &str) {
        let path = self.path(name);
        fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.path("calls.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Run the binary with the fake tools configured through the environment.
    fn run(&self, args: &[&Path]) -> Output {
        run_with(args, &self.path("avr-objcopy"), &self.path("avr-objdump"))
    }

    fn run_convert(&self, extra: &[&Path]) -> Output {
        let elf = self.path("firmware.elf");
        let bin = self.path("firmware.bin");
        let xref = self.path("firmware.xref");
        let mut args = extra.to_vec();
        args.extend([elf.as_path(), bin.as_path(), xref.as_path()]);
        self.run(&args)
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.dir);
    }
}

fn run_with(args: &[&Path], objcopy: &Path, objdump: &Path) -> Output {
    run_in(Path::new("."), args, objcopy, objdump)
}

fn run_in(dir: &Path, args: &[&Path], objcopy: &Path, objdump: &Path) -> Output {
    duct::cmd(BIN, args)
        .dir(dir)
        .env("AVR_OBJCOPY", objcopy)
        .env("AVR_OBJDUMP", objdump)
        .env_remove("RUST_LOG")
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()
        .expect("failed to run avr-xref")
}

#[test]
fn wrong_argument_count_prints_usage() {
    let scratch = Scratch::new("usage");
    let a = scratch.path("a");
    let b = scratch.path("b");
    let c = scratch.path("c");
    let d = scratch.path("d");
    for args in [
        vec![],
        vec![a.as_path()],
        vec![a.as_path(), b.as_path()],
        vec![a.as_path(), b.as_path(), c.as_path(), d.as_path()],
    ] {
        let output = scratch.run(&args);
        assert_eq!(output.status.code(), Some(1), "{args:?}");
        let stdout = String::from_utf8(output.stdout).unwrap();
        assert!(stdout.starts_with("usage: "), "{stdout:?}");
        assert!(stdout.contains("avr-xref"), "{stdout:?}");
        assert!(stdout.contains("<elf-file(in)> <bin-file(out)> <xref-file(out)>"));
    }
    assert!(scratch.calls().is_empty());
}

#[test]
fn converts_elf() {
    let scratch = Scratch::new("convert");
    let output = scratch.run_convert(&[]);
    assert!(output.status.success(), "{output:?}");
    assert!(output.stdout.is_empty(), "{output:?}");

    let elf = scratch.path("firmware.elf");
    let bin = scratch.path("firmware.bin");
    assert_eq!(
        scratch.calls(),
        [
            format!(
                "objcopy -I elf32-avr -O binary {} {}",
                elf.display(),
                bin.display()
            ),
            format!("objdump -t -C {}", elf.display()),
        ]
    );
    assert_eq!(
        fs::read_to_string(&bin).unwrap(),
        format!("BIN:{}", elf.display())
    );

    let xref = fs::read_to_string(scratch.path("firmware.xref")).unwrap();
    assert_eq!(
        xref,
        "j 0x0 .text\n\
         j 0x34 .do_copy_data_loop\n\
         c 0x80 myFunc\n\
         c 0x89 ns::Blink::toggle\n\
         j 0x0 __vectors\n"
    );

    let entries = read_xref(xref.as_bytes()).unwrap();
    assert_eq!(entries[2].kind, XrefKind::Code);
    assert_eq!(entries[2].address, 0x80);
}

#[test]
fn conversion_is_idempotent() {
    let scratch = Scratch::new("idempotent");
    assert!(scratch.run_convert(&[]).status.success());
    let bin = fs::read(scratch.path("firmware.bin")).unwrap();
    let xref = fs::read(scratch.path("firmware.xref")).unwrap();

    assert!(scratch.run_convert(&[]).status.success());
    assert_eq!(fs::read(scratch.path("firmware.bin")).unwrap(), bin);
    assert_eq!(fs::read(scratch.path("firmware.xref")).unwrap(), xref);
}

#[test]
fn tool_flags_override_environment() {
    let scratch = Scratch::new("flags");
    let elf = scratch.path("firmware.elf");
    let bin = scratch.path("firmware.bin");
    let xref = scratch.path("firmware.xref");
    let objcopy = scratch.path("avr-objcopy");
    let objdump = scratch.path("avr-objdump");
    let missing = Path::new("/nonexistent/avr-objcopy");
    let output = run_with(
        &[
            Path::new("--objcopy"),
            objcopy.as_path(),
            Path::new("--objdump"),
            objdump.as_path(),
            elf.as_path(),
            bin.as_path(),
            xref.as_path(),
        ],
        missing,
        missing,
    );
    assert!(output.status.success(), "{output:?}");
    assert_eq!(scratch.calls().len(), 2);
}

#[test]
fn missing_tools_are_tolerated() {
    let scratch = Scratch::new("missing");
    let elf = scratch.path("firmware.elf");
    let bin = scratch.path("firmware.bin");
    let xref = scratch.path("firmware.xref");
    let missing = Path::new("/nonexistent/avr-objdump");
    let output = run_with(&[elf.as_path(), bin.as_path(), xref.as_path()], missing, missing);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(fs::read_to_string(&xref).unwrap(), "");
}

#[test]
fn strict_mode_fails_on_objcopy_failure() {
    let scratch = Scratch::new("strict");
    scratch.script(
        "avr-objcopy",
        "echo 'avr-objcopy: firmware.elf: file format not recognized' >&2\nexit 1\n",
    );
    let output = scratch.run_convert(&[Path::new("--strict")]);
    assert_eq!(output.status.code(), Some(1), "{output:?}");
    // the listing is still produced
    let xref = fs::read_to_string(scratch.path("firmware.xref")).unwrap();
    assert!(xref.contains("c 0x80 myFunc"));

    let output = scratch.run_convert(&[]);
    assert!(output.status.success(), "{output:?}");
}

#[test]
fn strict_mode_fails_on_objdump_failure() {
    let scratch = Scratch::new("strict-objdump");
    scratch.script(
        "avr-objdump",
        "cat \"$(dirname \"$0\")/symbols.txt\"\necho 'avr-objdump: truncated symbol table' >&2\nexit 1\n",
    );
    let output = scratch.run_convert(&[Path::new("--strict")]);
    assert_eq!(output.status.code(), Some(1), "{output:?}");
    assert!(fs::read(scratch.path("firmware.bin")).is_ok());
    let xref = fs::read_to_string(scratch.path("firmware.xref")).unwrap();
    assert!(xref.contains("c 0x80 myFunc"));

    let output = scratch.run_convert(&[]);
    assert!(output.status.success(), "{output:?}");
}

#[test]
fn hyphen_prefixed_paths_are_files() {
    let scratch = Scratch::new("hyphen");
    fs::copy(scratch.path("firmware.elf"), scratch.path("-fw.elf")).unwrap();
    let output = run_in(
        &scratch.dir,
        &[Path::new("-fw.elf"), Path::new("fw.bin"), Path::new("fw.xref")],
        &scratch.path("avr-objcopy"),
        &scratch.path("avr-objdump"),
    );
    assert!(output.status.success(), "{output:?}");
    assert!(output.stdout.is_empty(), "{output:?}");
    assert_eq!(
        scratch.calls(),
        [
            "objcopy -I elf32-avr -O binary -fw.elf fw.bin",
            "objdump -t -C -fw.elf",
        ]
    );
    assert_eq!(
        fs::read_to_string(scratch.path("fw.bin")).unwrap(),
        "BIN:-fw.elf"
    );
    let xref = fs::read_to_string(scratch.path("fw.xref")).unwrap();
    assert!(xref.contains("c 0x80 myFunc"));
}

#[test]
fn quiet_silences_objcopy_output() {
    let scratch = Scratch::new("quiet");
    scratch.script(
        "avr-objcopy",
        "echo 'avr-objcopy: warning: section .noinit is empty' >&2\nprintf 'BIN' > \"$6\"\n",
    );

    let output = scratch.run_convert(&[]);
    assert!(output.status.success(), "{output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("section .noinit is empty"), "{stderr}");

    let output = scratch.run_convert(&[Path::new("-q")]);
    assert!(output.status.success(), "{output:?}");
    assert!(output.stderr.is_empty(), "{output:?}");
    assert_eq!(fs::read_to_string(scratch.path("firmware.bin")).unwrap(), "BIN");
}
