use std::fmt;

use crate::error::RenderError;

/// Display information for one enumerated adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdapterEntry {
    pub index: usize,
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
}

impl AdapterEntry {
    fn from_info(index: usize, info: &wgpu::AdapterInfo) -> Self {
        Self {
            index,
            name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
        }
    }

    pub fn is_software(&self) -> bool {
        matches!(self.device_type, wgpu::DeviceType::Cpu)
    }
}

impl fmt::Display for AdapterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({:?}, {:?})",
            self.index, self.name, self.backend, self.device_type
        )
    }
}

/// Ordered adapter list captured once at startup, plus the current selection.
pub struct AdapterSelector {
    entries: Vec<AdapterEntry>,
    adapters: Vec<wgpu::Adapter>,
    selected: usize,
}

impl AdapterSelector {
    pub fn enumerate(instance: &wgpu::Instance) -> Self {
        let adapters = instance.enumerate_adapters(wgpu::Backends::all());
        let entries = adapters
            .iter()
            .enumerate()
            .map(|(index, adapter)| AdapterEntry::from_info(index, &adapter.get_info()))
            .collect::<Vec<_>>();
        for entry in &entries {
            tracing::debug!(
                index = entry.index,
                name = %entry.name,
                backend = ?entry.backend,
                device_type = ?entry.device_type,
                "found GPU adapter"
            );
        }
        Self {
            entries,
            adapters,
            selected: 0,
        }
    }

    #[cfg(test)]
    fn from_entries(entries: Vec<AdapterEntry>) -> Self {
        Self {
            entries,
            adapters: Vec::new(),
            selected: 0,
        }
    }

    pub fn entries(&self) -> &[AdapterEntry] {
        &self.entries
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_entry(&self) -> Option<&AdapterEntry> {
        self.entries.get(self.selected)
    }

    /// Moves the selection; returns whether it actually changed.
    pub fn select(&mut self, index: usize) -> Result<bool, RenderError> {
        if self.entries.is_empty() {
            return Err(RenderError::NoAdapters);
        }
        if index >= self.entries.len() {
            return Err(RenderError::AdapterOutOfRange {
                index,
                available: self.entries.len(),
            });
        }
        let changed = index != self.selected;
        self.selected = index;
        Ok(changed)
    }

    /// Index after the current one, wrapping around.
    pub fn next_index(&self) -> usize {
        if self.entries.is_empty() {
            0
        } else {
            (self.selected + 1) % self.entries.len()
        }
    }

    pub(crate) fn adapter(&self) -> Result<&wgpu::Adapter, RenderError> {
        if self.adapters.is_empty() {
            return Err(RenderError::NoAdapters);
        }
        self.adapters
            .get(self.selected)
            .ok_or(RenderError::AdapterOutOfRange {
                index: self.selected,
                available: self.adapters.len(),
            })
    }
}
