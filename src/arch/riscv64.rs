use elf::abi::*;

pub const EM_ARCH: u16 = EM_RISCV;

pub const REL_JUMP_SLOT: u32 = R_RISCV_JUMP_SLOT;
// riscv has no GLOB_DAT, GOT entries are plain R_RISCV_64
pub const REL_GOT: u32 = u32::MAX;
pub const REL_SYMBOLIC: u32 = R_RISCV_64;

/// Map riscv64 relocation types to human readable names
pub(crate) fn rel_type_to_str(r_type: usize) -> &'static str {
    match r_type as u32 {
        R_RISCV_NONE => "R_RISCV_NONE",
        R_RISCV_64 => "R_RISCV_64",
        R_RISCV_RELATIVE => "R_RISCV_RELATIVE",
        R_RISCV_COPY => "R_RISCV_COPY",
        R_RISCV_JUMP_SLOT => "R_RISCV_JUMP_SLOT",
        R_RISCV_IRELATIVE => "R_RISCV_IRELATIVE",
        _ => "R_RISCV_UNKNOWN",
    }
}
