//! Convert an AVR ELF executable into a raw binary image plus a
//! cross-reference listing of code labels at their program-memory word
//! addresses, by way of `avr-objcopy` and `avr-objdump`.

pub mod args;
pub mod convert;
pub mod symbol;
pub mod tool;
pub mod xref;
