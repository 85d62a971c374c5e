use super::{error::*, Backend, Device, DeviceType};
use anyhow::Result;
use std::{fmt, str::FromStr};

const REJECT: i32 = -1;
const MATCH: i32 = 1000;

/** A single `backend:device_type:index` entry of a filter string.

Every part is optional, but the parts that are present keep that order, so `gpu`,
`opencl:1` and `*:cpu:0` are all valid. `*` matches any backend or device type.

The index counts devices matching the backend and device type, in enumeration order.
*/
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Filter {
    backend: Option<Backend>,
    device_type: Option<DeviceType>,
    index: Option<usize>,
}

impl Filter {
    /// The backend, `None` matches any.
    pub fn backend(&self) -> Option<Backend> {
        self.backend
    }
    /// The device type, `None` matches any.
    pub fn device_type(&self) -> Option<DeviceType> {
        self.device_type
    }
    /// The index among matching devices, `None` matches all.
    pub fn index(&self) -> Option<usize> {
        self.index
    }
    fn matches_kind(&self, backend: Backend, device_type: DeviceType) -> bool {
        self.backend.map_or(true, |x| x == backend)
            && self.device_type.map_or(true, |x| x == device_type)
    }
    fn parse(input: &str, filter: &str) -> Result<Self, FilterParseError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(FilterParseError::Empty {
                filter: filter.to_string(),
            });
        }
        let unexpected = |token: &str| FilterParseError::UnexpectedToken {
            token: token.to_string(),
            filter: filter.to_string(),
        };
        let mut this = Self::default();
        // 0: backend, 1: device type, 2: index, 3: done
        let mut stage = 0;
        for token in input.split(':') {
            let token = token.trim();
            if stage == 0 {
                if token == "*" {
                    stage = 1;
                    continue;
                } else if let Ok(backend) = Backend::from_str(token) {
                    this.backend.replace(backend);
                    stage = 1;
                    continue;
                }
            }
            if stage <= 1 {
                if token == "*" {
                    stage = 2;
                    continue;
                } else if let Ok(device_type) = DeviceType::from_str(token) {
                    this.device_type.replace(device_type);
                    stage = 2;
                    continue;
                }
            }
            if stage <= 2 && !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(index) = usize::from_str(token) {
                    this.index.replace(index);
                    stage = 3;
                    continue;
                }
            }
            return Err(unexpected(token));
        }
        Ok(this)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.backend {
            Some(backend) => write!(f, "{backend}")?,
            None => write!(f, "*")?,
        }
        match self.device_type {
            Some(device_type) => write!(f, ":{device_type}")?,
            None => write!(f, ":*")?,
        }
        if let Some(index) = self.index {
            write!(f, ":{index}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum SelectorKind {
    Default,
    Cpu,
    Gpu,
    Accelerator,
    Host,
    Filter(Vec<Filter>),
}

/** Selects a device.

Each device gets a score, negative scores reject. [`select`](DeviceSelector::select) picks
the device with the highest score, ties go to the device enumerated first.

A selector can be parsed from a comma separated list of [filters](Filter):
```
# use syclinterface::device::DeviceSelector;
let selector = "opencl:gpu:0, level_zero:gpu".parse::<DeviceSelector>().unwrap();
assert_eq!(selector.to_string(), "opencl:gpu:0,level_zero:gpu");
assert!("opencl:gpu:-1".parse::<DeviceSelector>().is_err());
```
*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceSelector {
    kind: SelectorKind,
}

impl DeviceSelector {
    /// Prefers gpus, then accelerators, then cpus, then the host.
    pub fn default_selector() -> Self {
        Self {
            kind: SelectorKind::Default,
        }
    }
    /// Selects cpus.
    pub fn cpu() -> Self {
        Self {
            kind: SelectorKind::Cpu,
        }
    }
    /// Selects gpus.
    pub fn gpu() -> Self {
        Self {
            kind: SelectorKind::Gpu,
        }
    }
    /// Selects accelerators.
    pub fn accelerator() -> Self {
        Self {
            kind: SelectorKind::Accelerator,
        }
    }
    /// Selects the host.
    pub fn host() -> Self {
        Self {
            kind: SelectorKind::Host,
        }
    }
    /// The filters, if created from a filter string.
    pub fn filters(&self) -> Option<&[Filter]> {
        if let SelectorKind::Filter(filters) = &self.kind {
            Some(filters)
        } else {
            None
        }
    }
    /** Scores `device` against the enumerated devices.

    Returns a negative score if the device is rejected or not enumerated. */
    pub fn score(&self, device: &Device) -> i32 {
        let devices = Device::list();
        devices
            .iter()
            .position(|x| x == device)
            .map_or(REJECT, |position| self.scores(kinds(devices))[position])
    }
    /** Selects a device from [`Device::list()`].

    **errors**
    - [`DeviceNotFound`](super::error::DeviceNotFound) if every device is rejected. */
    pub fn select(&self) -> Result<Device> {
        self.select_from(Device::list())
    }
    pub(crate) fn select_from(&self, devices: &[Device]) -> Result<Device> {
        let device = best(&self.scores(kinds(devices))).map(|i| devices[i].clone());
        log::debug!("selector {self} selected {device:?}");
        device.ok_or_else(|| {
            DeviceNotFound {
                selector: self.to_string(),
            }
            .into()
        })
    }
    pub(crate) fn retain(&self, devices: Vec<Device>) -> Vec<Device> {
        let scores = self.scores(kinds(&devices));
        devices
            .into_iter()
            .zip(scores)
            .filter_map(|(device, score)| (score >= 0).then_some(device))
            .collect()
    }
    fn scores(&self, kinds: impl IntoIterator<Item = (Backend, DeviceType)>) -> Vec<i32> {
        use DeviceType::*;
        let kinds: Vec<_> = kinds.into_iter().collect();
        let typed = |ty: DeviceType| -> Vec<i32> {
            kinds
                .iter()
                .map(|(_, x)| if *x == ty { MATCH } else { REJECT })
                .collect()
        };
        match &self.kind {
            SelectorKind::Default => kinds
                .iter()
                .map(|(_, device_type)| match device_type {
                    Gpu => 500,
                    Accelerator => 400,
                    Cpu => 300,
                    Host => 100,
                })
                .collect(),
            SelectorKind::Cpu => typed(Cpu),
            SelectorKind::Gpu => typed(Gpu),
            SelectorKind::Accelerator => typed(Accelerator),
            SelectorKind::Host => typed(Host),
            SelectorKind::Filter(filters) => {
                let mut scores = vec![REJECT; kinds.len()];
                for filter in filters {
                    let matching = kinds
                        .iter()
                        .enumerate()
                        .filter(|(_, (backend, device_type))| {
                            filter.matches_kind(*backend, *device_type)
                        })
                        .map(|(i, _)| i);
                    if let Some(index) = filter.index {
                        if let Some(i) = matching.clone().nth(index) {
                            scores[i] = MATCH;
                        }
                    } else {
                        for i in matching {
                            scores[i] = MATCH;
                        }
                    }
                }
                scores
            }
        }
    }
}

fn kinds(devices: &[Device]) -> impl Iterator<Item = (Backend, DeviceType)> + '_ {
    devices.iter().map(|x| (x.backend(), x.device_type()))
}

fn best(scores: &[i32]) -> Option<usize> {
    let mut best: Option<(usize, i32)> = None;
    for (i, score) in scores.iter().copied().enumerate() {
        if score < 0 {
            continue;
        }
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best.replace((i, score));
        }
    }
    best.map(|(i, _)| i)
}

/// See [`DeviceSelector::default_selector()`].
impl Default for DeviceSelector {
    fn default() -> Self {
        Self::default_selector()
    }
}

impl FromStr for DeviceSelector {
    type Err = FilterParseError;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let filters = input
            .split(',')
            .map(|x| Filter::parse(x, input))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            kind: SelectorKind::Filter(filters),
        })
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            SelectorKind::Default => write!(f, "default"),
            SelectorKind::Cpu => write!(f, "cpu"),
            SelectorKind::Gpu => write!(f, "gpu"),
            SelectorKind::Accelerator => write!(f, "accelerator"),
            SelectorKind::Host => write!(f, "host"),
            SelectorKind::Filter(filters) => {
                for (i, filter) in filters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{filter}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Backend::*;
    use DeviceType::*;

    fn filter(input: &str) -> Filter {
        input.parse::<DeviceSelector>().unwrap().filters().unwrap()[0]
    }

    const KINDS: [(Backend, DeviceType); 5] = [
        (OpenCl, Cpu),
        (OpenCl, Gpu),
        (LevelZero, Gpu),
        (OpenCl, Gpu),
        (Backend::Host, DeviceType::Host),
    ];

    fn selected(selector: &DeviceSelector) -> Option<usize> {
        best(&selector.scores(KINDS))
    }

    #[test]
    fn parse_full_filter() {
        let f = filter("opencl:gpu:0");
        assert_eq!(f.backend(), Some(OpenCl));
        assert_eq!(f.device_type(), Some(Gpu));
        assert_eq!(f.index(), Some(0));
        assert_eq!(f.to_string(), "opencl:gpu:0");
    }

    #[test]
    fn parse_partial_filters() {
        assert_eq!(filter("opencl").backend(), Some(OpenCl));
        assert_eq!(filter("opencl").device_type(), None);
        assert_eq!(filter("gpu").backend(), None);
        assert_eq!(filter("gpu").device_type(), Some(Gpu));
        assert_eq!(filter("gpu:1").index(), Some(1));
        assert_eq!(filter("3").index(), Some(3));
        assert_eq!(filter("*:cpu").device_type(), Some(Cpu));
        assert_eq!(filter(" OpenCL : CPU ").to_string(), "opencl:cpu");
        let host = filter("host");
        assert_eq!(host.backend(), Some(Backend::Host));
        assert_eq!(host.device_type(), None);
        assert_eq!(filter("host:host:0").device_type(), Some(DeviceType::Host));
    }

    #[test]
    fn parse_malformed_filters() {
        for input in [
            "",
            " ",
            "opencl:gpu:-1",
            "opencl:gpu:0:1",
            "gpu:opencl",
            "0:gpu",
            "opencl::0",
            "opencl:gpu:x",
            "vulkan:gpu:0",
            "opencl:gpu:+1",
            "opencl,",
            ",gpu",
        ] {
            assert!(
                input.parse::<DeviceSelector>().is_err(),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn parse_errors_name_the_token() {
        let e = "opencl:fpga:0".parse::<DeviceSelector>().unwrap_err();
        assert_eq!(
            e,
            FilterParseError::UnexpectedToken {
                token: "fpga".to_string(),
                filter: "opencl:fpga:0".to_string(),
            }
        );
    }

    #[test]
    fn filter_index_counts_matching_devices() {
        let selector: DeviceSelector = "opencl:gpu:1".parse().unwrap();
        assert_eq!(selected(&selector), Some(3));
        let selector: DeviceSelector = "gpu:1".parse().unwrap();
        assert_eq!(selected(&selector), Some(2));
        let selector: DeviceSelector = "opencl:gpu:2".parse().unwrap();
        assert_eq!(selected(&selector), None);
        let selector: DeviceSelector = "opencl:acc".parse().unwrap();
        assert_eq!(selected(&selector), None);
    }

    #[test]
    fn filter_without_index_picks_first_match() {
        let selector: DeviceSelector = "opencl:gpu".parse().unwrap();
        assert_eq!(selected(&selector), Some(1));
        assert_eq!(
            selector.scores(KINDS),
            vec![REJECT, MATCH, REJECT, MATCH, REJECT]
        );
    }

    #[test]
    fn filter_list_is_a_union() {
        let selector: DeviceSelector = "level_zero, host".parse().unwrap();
        assert_eq!(
            selector.scores(KINDS),
            vec![REJECT, REJECT, MATCH, REJECT, MATCH]
        );
        assert_eq!(selected(&selector), Some(2));
    }

    #[test]
    fn default_selector_prefers_gpus() {
        assert_eq!(selected(&DeviceSelector::default()), Some(1));
        assert_eq!(
            best(&DeviceSelector::default().scores([(OpenCl, Cpu), (Backend::Host, DeviceType::Host)])),
            Some(0)
        );
    }

    #[test]
    fn typed_selectors() {
        assert_eq!(selected(&DeviceSelector::cpu()), Some(0));
        assert_eq!(selected(&DeviceSelector::gpu()), Some(1));
        assert_eq!(selected(&DeviceSelector::accelerator()), None);
        assert_eq!(selected(&DeviceSelector::host()), Some(4));
    }

    #[test]
    fn host_is_always_enumerated() {
        if std::env::var(super::super::DEVICE_FILTER_ENV).is_ok() {
            return;
        }
        let host = DeviceSelector::host().select().unwrap();
        assert!(host.is_host());
        assert_eq!(DeviceSelector::host().score(&host), MATCH);
        assert!(DeviceSelector::gpu().score(&host) < 0);
        assert!("host:host:0".parse::<DeviceSelector>().unwrap().select().unwrap().is_host());
    }

    #[test]
    fn retain_drops_rejected_devices() {
        let devices = vec![Device::host()];
        assert_eq!(DeviceSelector::host().retain(devices.clone()).len(), 1);
        assert!(DeviceSelector::gpu().retain(devices).is_empty());
    }
}
