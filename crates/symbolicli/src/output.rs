use std::collections::HashMap;
use std::iter::Peekable;
use std::vec::IntoIter;

use prettytable::{Row, Table, cell, format::consts::FORMAT_CLEAN, row};
use symbolic::common::split_path;
use symbolicator_native::interface::{
    CompleteObjectInfo, CompletedSymbolicationResponse, FrameStatus, FrameTrust, StackId,
    SymbolicatedFrame,
};

#[derive(Clone, Debug)]
struct NativeFrameData {
    instruction_addr: Option<u64>,
    trust: &'static str,
    status: &'static str,
    module: Option<(String, u64)>,
    func: Option<(String, u64)>,
    file: Option<(String, u32)>,
}

#[derive(Clone, Debug)]
struct NativeFrames {
    inner: Peekable<IntoIter<SymbolicatedFrame>>,
    modules: HashMap<String, CompleteObjectInfo>,
}

fn status_name(status: FrameStatus) -> &'static str {
    match status {
        FrameStatus::Symbolicated => "ok",
        FrameStatus::MissingSymbol => "no symbol",
        FrameStatus::UnknownImage => "no image",
        FrameStatus::Missing => "failed",
        FrameStatus::Passthrough => "passthrough",
    }
}

impl Iterator for NativeFrames {
    type Item = NativeFrameData;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.inner.next()?;
        let is_inline = self
            .inner
            .peek()
            .is_some_and(|next_frame| next_frame.original_index == frame.original_index);

        let trust = if is_inline {
            "inline"
        } else {
            match frame.raw.trust {
                FrameTrust::None => "none",
                FrameTrust::Scan => "scan",
                FrameTrust::CfiScan => "cfiscan",
                FrameTrust::Fp => "fp",
                FrameTrust::Cfi => "cfi",
                FrameTrust::PreWalked => "prewalked",
                FrameTrust::Context => "context",
            }
        };

        let instruction_addr = frame.raw.instruction_addr.map(|addr| addr.0);

        let module = frame.raw.package.map(|module_file| {
            let module_rel_addr = self
                .modules
                .get(&module_file)
                .zip(instruction_addr)
                .and_then(|(module, addr)| module.abs_to_rel_addr(addr))
                .unwrap_or_default();
            let module_file = split_path(&module_file).1.into();

            (module_file, module_rel_addr)
        });

        let func = frame.raw.function.or(frame.raw.symbol).map(|func| {
            let sym_rel_addr = frame
                .raw
                .symbol_addr
                .zip(instruction_addr)
                .and_then(|(sym_addr, addr)| addr.checked_sub(sym_addr.0))
                .unwrap_or_default();

            (func, sym_rel_addr)
        });

        let file = frame.raw.filename.map(|file| {
            let line = frame.raw.lineno.unwrap_or(0);

            (file, line)
        });

        Some(NativeFrameData {
            instruction_addr,
            trust,
            status: status_name(frame.status),
            module,
            func,
            file,
        })
    }
}

/// Takes the frames of the first exception, or of the first stack if there is no exception.
fn get_crashing_frames(mut response: CompletedSymbolicationResponse) -> Option<NativeFrames> {
    let modules: HashMap<_, _> = response
        .modules
        .into_iter()
        .filter_map(|module| Some((module.raw.name.clone()?, module)))
        .collect();

    let crashing_idx = response
        .stacktraces
        .iter()
        .position(|s| s.id == StackId::Exception(0))
        .unwrap_or(0);

    if crashing_idx >= response.stacktraces.len() {
        return None;
    }

    let crashing = response.stacktraces.swap_remove(crashing_idx);
    Some(NativeFrames {
        inner: crashing.frames.into_iter().peekable(),
        modules,
    })
}

fn format_addr(addr: Option<u64>) -> String {
    addr.map(|addr| format!("{addr:#x}")).unwrap_or_default()
}

pub fn print_compact(response: CompletedSymbolicationResponse) {
    let Some(frames) = get_crashing_frames(response) else {
        return;
    };

    let mut table = Table::new();
    table.set_format(*FORMAT_CLEAN);
    table.set_titles(
        row![b => "Trust", "Status", "Instruction", "Module File", "", "Function", "", "File"],
    );

    for frame in frames {
        let mut row = Row::empty();
        let NativeFrameData {
            instruction_addr,
            trust,
            status,
            module,
            func,
            file,
        } = frame;

        row.add_cell(cell!(trust));
        row.add_cell(cell!(status));
        row.add_cell(cell!(r->format_addr(instruction_addr)));

        match module {
            Some((module_file, module_offset)) => {
                row.add_cell(cell!(module_file));
                row.add_cell(cell!(r->format!("+{module_offset:#x}")));
            }
            None => row.add_cell(cell!("").with_hspan(2)),
        }

        match func {
            Some((func, func_offset)) => {
                row.add_cell(cell!(func));
                row.add_cell(cell!(r->format!("+{func_offset:#x}")));
            }
            None => row.add_cell(cell!("").with_hspan(2)),
        }

        match file {
            Some((name, line)) => row.add_cell(cell!(format!("{name}:{line}"))),
            None => row.add_cell(cell!("")),
        }

        table.add_row(row);
    }

    table.printstd();
}

pub fn print_pretty(response: CompletedSymbolicationResponse) {
    let Some(frames) = get_crashing_frames(response) else {
        return;
    };

    let mut table = Table::new();
    table.set_format(*FORMAT_CLEAN);

    for (i, frame) in frames.enumerate() {
        let NativeFrameData {
            instruction_addr,
            trust,
            status,
            module,
            func,
            file,
        } = frame;

        let title_cell = cell!(lb->format!("Frame #{i}")).with_hspan(2);
        table.add_row(Row::new(vec![title_cell]));

        table.add_row(row![r->"  Trust:", trust]);
        table.add_row(row![r->"  Status:", status]);
        if instruction_addr.is_some() {
            table.add_row(row![r->"  Instruction:", format_addr(instruction_addr)]);
        }

        if let Some((module_file, module_offset)) = module {
            table.add_row(row![
                r->"  Module:",
                format!("{module_file} +{module_offset:#x}")
            ]);
        }

        if let Some((func, func_offset)) = func {
            table.add_row(row![r->"  Function:", format!("{func} +{func_offset:#x}")]);
        }

        if let Some((name, line)) = file {
            table.add_row(row![r->"  File:", format!("{name}:{line}")]);
        }

        table.add_empty_row();
    }
    table.printstd();
}
