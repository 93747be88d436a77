use crate::domain::model::{ModuleCatalog, ModuleId, Socket, VehicleHandle};
use crate::domain::ports::InventorySystem;
use crate::utils::error::{ProvisionError, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SocketOp {
    Remove(usize),
    /// A 2-span add consumes `index + 1` as well.
    Add(usize, ModuleId),
}

/// Plans socket add/remove operations that turn one module layout into another.
pub struct ModuleSocketPlanner<'a> {
    catalog: &'a ModuleCatalog,
}

impl<'a> ModuleSocketPlanner<'a> {
    pub fn new(catalog: &'a ModuleCatalog) -> Self {
        Self { catalog }
    }

    /// Removal pass runs to completion before the addition pass so that
    /// 2-span modules are fully vacated before either socket is reclaimed.
    pub fn reconcile(&self, current: &[Socket], target: &[ModuleId]) -> Result<Vec<SocketOp>> {
        if current.len() != target.len() {
            return Err(ProvisionError::SocketCountMismatch {
                current: current.len(),
                target: target.len(),
            });
        }
        self.validate_target(target)?;

        let mut working = current.to_vec();
        let mut ops = Vec::new();

        for (index, socket) in current.iter().enumerate() {
            if let Some(module) = socket.primary_module() {
                if module != target[index] {
                    ops.push(SocketOp::Remove(index));
                    vacate(&mut working, index, module);
                }
            }
        }

        for (index, &desired) in target.iter().enumerate() {
            if desired.is_empty() || !working[index].is_empty() {
                continue;
            }

            let span = self.span_of(desired)?;
            if span == 2 && !matches!(working.get(index + 1), Some(Socket::Empty)) {
                return Err(ProvisionError::SpanConflict { index });
            }

            claim(&mut working, index, desired, span);
            ops.push(SocketOp::Add(index, desired));
        }

        tracing::debug!("Planned {} socket operations", ops.len());
        Ok(ops)
    }

    /// Forwards `ops` to the inventory in order. Returns the adds that the
    /// inventory refused.
    pub fn apply<I: InventorySystem + ?Sized>(
        &self,
        inventory: &mut I,
        handle: VehicleHandle,
        ops: &[SocketOp],
    ) -> Result<Vec<SocketOp>> {
        let mut refused = Vec::new();
        for op in ops {
            match *op {
                SocketOp::Remove(index) => inventory.remove_module(handle, index)?,
                SocketOp::Add(index, module) => {
                    if !inventory.add_module(handle, index, module)? {
                        tracing::warn!("Module {} could not be attached at socket {}", module, index);
                        refused.push(*op);
                    }
                }
            }
        }
        Ok(refused)
    }

    /// Layout that results from applying `ops` to `current`, as pure data.
    /// Ops addressing sockets past the end of the layout are ignored.
    pub fn simulate(&self, current: &[Socket], ops: &[SocketOp]) -> Vec<Socket> {
        let mut layout = current.to_vec();
        for op in ops {
            match *op {
                SocketOp::Remove(index) => {
                    if let Some(module) = layout.get(index).and_then(Socket::primary_module) {
                        vacate(&mut layout, index, module);
                    }
                }
                SocketOp::Add(index, module) if index < layout.len() => {
                    let span = self.catalog.span(module).unwrap_or(1);
                    claim(&mut layout, index, module, span);
                }
                SocketOp::Add(index, module) => {
                    tracing::debug!("Ignoring add of module {} at missing socket {}", module, index);
                }
            }
        }
        layout
    }

    /// Inserts a continuation `0` after every 2-span module id.
    pub fn normalize(&self, module_ids: &[ModuleId]) -> Vec<ModuleId> {
        let mut normalized = Vec::with_capacity(module_ids.len() + 2);
        for &id in module_ids {
            normalized.push(id);
            if !id.is_empty() && self.catalog.span(id) == Some(2) {
                normalized.push(ModuleId::EMPTY);
            }
        }
        normalized
    }

    /// Strips the continuation `0` that follows each 2-span module id.
    pub fn denormalize(&self, module_ids: &[ModuleId]) -> Vec<ModuleId> {
        let mut stripped = Vec::with_capacity(module_ids.len());
        let mut skip_next = false;
        for &id in module_ids {
            if skip_next && id.is_empty() {
                skip_next = false;
                continue;
            }
            skip_next = !id.is_empty() && self.catalog.span(id) == Some(2);
            stripped.push(id);
        }
        stripped
    }

    /// Native layout from the flat legacy encoding.
    pub fn layout_from_legacy(&self, module_ids: &[ModuleId]) -> Vec<Socket> {
        let mut layout = vec![Socket::Empty; module_ids.len()];
        let mut index = 0;
        while index < module_ids.len() {
            let id = module_ids[index];
            if id.is_empty() {
                index += 1;
                continue;
            }
            let span = self.catalog.span(id).unwrap_or(1);
            claim(&mut layout, index, id, span);
            index += span.max(1);
        }
        layout
    }

    fn validate_target(&self, target: &[ModuleId]) -> Result<()> {
        for (index, &id) in target.iter().enumerate() {
            if id.is_empty() {
                continue;
            }
            if self.span_of(id)? == 2 {
                let continuation_free = target.get(index + 1).is_some_and(|next| next.is_empty());
                if !continuation_free {
                    return Err(ProvisionError::SpanConflict { index });
                }
            }
        }
        Ok(())
    }

    fn span_of(&self, id: ModuleId) -> Result<usize> {
        self.catalog
            .span(id)
            .ok_or(ProvisionError::UnknownModule(id))
    }
}

/// Flat legacy encoding of a layout: primary module ids, `0` elsewhere.
pub fn legacy_from_layout(layout: &[Socket]) -> Vec<ModuleId> {
    layout
        .iter()
        .map(|socket| socket.primary_module().unwrap_or(ModuleId::EMPTY))
        .collect()
}

fn vacate(layout: &mut [Socket], index: usize, module: ModuleId) {
    layout[index] = Socket::Empty;
    if let Some(next) = layout.get_mut(index + 1) {
        if *next == Socket::continuation(module) {
            *next = Socket::Empty;
        }
    }
}

fn claim(layout: &mut [Socket], index: usize, module: ModuleId, span: usize) {
    layout[index] = Socket::primary(module);
    if span == 2 {
        if let Some(next) = layout.get_mut(index + 1) {
            *next = Socket::continuation(module);
        }
    }
}
