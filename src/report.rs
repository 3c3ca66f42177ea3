//! Reports returned by the engine
//!
//! Plain data plus `Display` renderings for the CLI.

use std::fmt;
use std::path::PathBuf;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Space accounting for a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    /// `used_blocks * block_size`
    pub used_bytes: u64,
    /// `total_bytes - used_bytes`
    pub free_bytes: u64,
    /// Volume size requested at creation
    pub total_bytes: u64,
    /// Data blocks held by files
    pub used_blocks: usize,
    /// Data blocks not held by any file
    pub free_blocks: usize,
    /// All data blocks
    pub data_blocks: usize,
}

impl Usage {
    /// Share of the total space in use, 0.0 ..= 100.0
    pub fn percent_used(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} free of {}",
            human_bytes(self.free_bytes),
            human_bytes(self.total_bytes)
        )?;
        write!(
            f,
            "{:.1}% used ({} of {} data blocks)",
            self.percent_used(),
            self.used_blocks,
            self.data_blocks
        )
    }
}

/// Geometry summary of a volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    pub path: PathBuf,
    pub total_space: u64,
    pub block_size: u32,
    pub total_blocks: u32,
    /// Header, table and directory blocks
    pub system_blocks: usize,
    pub data_blocks: usize,
    pub address_fat: u32,
    pub address_root: u32,
    pub address_data: u32,
    /// Directory slots across all directory blocks
    pub directory_capacity: usize,
}

impl fmt::Display for VolumeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let system_bytes = self.system_blocks as u64 * self.block_size as u64;
        writeln!(f, "{}", self.path.display())?;
        writeln!(f, "Total space:   {}", human_bytes(self.total_space))?;
        writeln!(f, "System data:   {}", human_bytes(system_bytes))?;
        writeln!(f, "Block size:    {}", human_bytes(self.block_size as u64))?;
        writeln!(f, "Total blocks:  {}", self.total_blocks)?;
        writeln!(f, "System blocks: {}", self.system_blocks)?;
        writeln!(f, "Data blocks:   {}", self.data_blocks)?;
        writeln!(f, "Max files:     {}", self.directory_capacity)?;
        write!(
            f,
            "Regions:       header 0 | table {} | directory {} | data {}",
            self.address_fat, self.address_root, self.address_data
        )
    }
}

/// Result of a consistency walk over directory and table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckReport {
    /// Directory entries
    pub files: usize,
    /// Table entries that are not free
    pub used_blocks: usize,
    /// Blocks reachable from some directory entry
    pub reachable_blocks: usize,
    /// Used blocks no directory entry reaches
    pub leaked_blocks: usize,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.leaked_blocks == 0
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files, {} blocks in use, {} reachable, {} leaked",
            self.files, self.used_blocks, self.reachable_blocks, self.leaked_blocks
        )
    }
}

/// "1.5MB" / "40.0KB" / "512B"
pub fn human_bytes(bytes: u64) -> String {
    if bytes >= MIB {
        format!("{:.1}MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1}KB", bytes as f64 / KIB as f64)
    } else {
        format!("{}B", bytes)
    }
}
