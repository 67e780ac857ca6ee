use symbolic::common::Arch;

use crate::interface::{CompleteObjectInfo, RawObjectInfo};

const CPU_ARCH_ABI64: u32 = 0x0100_0000;
const CPU_SUBTYPE_MASK: u32 = 0x00ff_ffff;

const CPU_TYPE_X86: u32 = 7;
const CPU_TYPE_ARM: u32 = 12;
const CPU_TYPE_POWERPC: u32 = 18;

/// Determines the architecture of an image.
///
/// An explicit `arch` name takes precedence over the Mach-O `cpu_type` and `cpu_subtype`.
pub fn detect_arch(raw: &RawObjectInfo) -> Arch {
    if let Some(arch) = raw.arch.as_deref().and_then(|arch| arch.parse().ok()) {
        return arch;
    }

    let Some(cpu_type) = raw.cpu_type else {
        return Arch::Unknown;
    };
    let subtype = raw.cpu_subtype.unwrap_or(0) & CPU_SUBTYPE_MASK;

    match (cpu_type, subtype) {
        (CPU_TYPE_X86, _) => Arch::X86,
        (t, 8) if t == CPU_TYPE_X86 | CPU_ARCH_ABI64 => Arch::Amd64h,
        (t, _) if t == CPU_TYPE_X86 | CPU_ARCH_ABI64 => Arch::Amd64,
        (CPU_TYPE_ARM, 6) => Arch::ArmV6,
        (CPU_TYPE_ARM, 9) => Arch::ArmV7,
        (CPU_TYPE_ARM, 11) => Arch::ArmV7s,
        (CPU_TYPE_ARM, 12) => Arch::ArmV7k,
        (CPU_TYPE_ARM, _) => Arch::Arm,
        (t, 2) if t == CPU_TYPE_ARM | CPU_ARCH_ABI64 => Arch::Arm64e,
        (t, _) if t == CPU_TYPE_ARM | CPU_ARCH_ABI64 => Arch::Arm64,
        (CPU_TYPE_POWERPC, _) => Arch::Ppc,
        (t, _) if t == CPU_TYPE_POWERPC | CPU_ARCH_ABI64 => Arch::Ppc64,
        _ => Arch::Unknown,
    }
}

/// The image an address was attributed to.
#[derive(Debug, Clone, Copy)]
pub struct ModuleLookupResult<'a> {
    /// Index of the image in the order it was registered.
    pub module_index: usize,
    pub object_info: &'a CompleteObjectInfo,
}

struct ModuleEntry {
    module_index: usize,
    object_info: CompleteObjectInfo,
    /// Exclusive end address, `u64::MAX` for an open-ended image.
    end_addr: u64,
    /// The largest `end_addr` of this and all entries sorted before it.
    max_end_addr: u64,
}

impl ModuleEntry {
    fn contains(&self, addr: u64) -> bool {
        self.object_info.raw.image_addr.0 <= addr && addr < self.end_addr
    }
}

/// The images loaded into a process, answering which image contains an address.
///
/// This is built once per event and not modified afterwards.
pub struct ModuleLookup {
    modules: Vec<ModuleEntry>,
}

impl ModuleLookup {
    /// Creates a new [`ModuleLookup`] out of the given module iterator.
    pub fn new<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = CompleteObjectInfo>,
    {
        let mut modules: Vec<_> = iter
            .into_iter()
            .enumerate()
            .map(|(module_index, object_info)| ModuleEntry {
                module_index,
                object_info,
                end_addr: 0,
                max_end_addr: 0,
            })
            .collect();

        // stable, so images with the same start keep their registration order
        modules.sort_by_key(|entry| entry.object_info.raw.image_addr.0);

        // back-fill the `image_size` in case it is missing (or 0), so that it spans up to the
        // next image. The last image in the list extends to infinity.
        let next_addrs: Vec<_> = modules
            .iter()
            .skip(1)
            .map(|entry| Some(entry.object_info.raw.image_addr.0))
            .chain(std::iter::once(None))
            .collect();

        let mut max_end_addr = 0;
        for (entry, next_addr) in modules.iter_mut().zip(next_addrs) {
            let raw = &mut entry.object_info.raw;
            let start_addr = raw.image_addr.0;

            if raw.image_size.unwrap_or(0) == 0
                && let Some(next_addr) = next_addr
            {
                raw.image_size = Some(next_addr - start_addr);
            }

            entry.end_addr = match raw.image_size {
                Some(size) if size > 0 => start_addr.saturating_add(size),
                // equal start addresses leave a zero-sized image behind which covers nothing
                Some(_) if next_addr.is_some() => start_addr,
                _ => u64::MAX,
            };

            max_end_addr = max_end_addr.max(entry.end_addr);
            entry.max_end_addr = max_end_addr;
        }

        Self { modules }
    }

    /// The number of registered images.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Returns the image registered at `module_index`.
    pub fn get(&self, module_index: usize) -> Option<&CompleteObjectInfo> {
        self.modules
            .iter()
            .find(|entry| entry.module_index == module_index)
            .map(|entry| &entry.object_info)
    }

    /// Returns the original `CompleteObjectInfo` list in its original sorting order.
    pub fn into_inner(mut self) -> Vec<CompleteObjectInfo> {
        self.modules.sort_by_key(|entry| entry.module_index);
        self.modules
            .into_iter()
            .map(|entry| entry.object_info)
            .collect()
    }

    /// Looks up the image containing `addr`.
    ///
    /// If several images claim the address, the one registered first wins.
    pub fn find_image(&self, addr: u64) -> Option<ModuleLookupResult<'_>> {
        // all entries starting at or before `addr`
        let candidates = self
            .modules
            .partition_point(|entry| entry.object_info.raw.image_addr.0 <= addr);

        let entry = self.modules[..candidates]
            .iter()
            .rev()
            .take_while(|entry| entry.max_end_addr > addr)
            .filter(|entry| entry.contains(addr))
            .min_by_key(|entry| entry.module_index)?;

        Some(ModuleLookupResult {
            module_index: entry.module_index,
            object_info: &entry.object_info,
        })
    }
}
