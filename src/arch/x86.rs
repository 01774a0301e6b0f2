use elf::abi::*;

pub const EM_ARCH: u16 = EM_386;

pub const REL_JUMP_SLOT: u32 = R_386_JMP_SLOT;
pub const REL_GOT: u32 = R_386_GLOB_DAT;
pub const REL_SYMBOLIC: u32 = R_386_32;

/// Map i386 relocation type to human readable name
pub(crate) fn rel_type_to_str(r_type: usize) -> &'static str {
    match r_type as u32 {
        R_386_NONE => "R_386_NONE",
        R_386_32 => "R_386_32",
        R_386_GLOB_DAT => "R_386_GLOB_DAT",
        R_386_JMP_SLOT => "R_386_JMP_SLOT",
        R_386_RELATIVE => "R_386_RELATIVE",
        _ => "UNKNOWN",
    }
}
