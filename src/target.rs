use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

use crate::subparser::{AsmSubParser, SubParserConfig};

/// Register set description for one target, as the sub-parser wants it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterInfo {
    pub arch: String,
    pub registers: Vec<String>,
}

/// Assembler syntax description for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblerInfo {
    pub arch: String,
    pub comment_prefix: String,
}

/// Instruction set description for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrInfo {
    pub arch: String,
    pub mnemonics: Vec<String>,
}

/// The concrete machine the assembly will be validated against: target
/// triple plus the host machine's CPU identifier and detected feature set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtargetInfo {
    pub triple: String,
    pub cpu: String,
    pub features: Vec<String>,
}

/// One registered target architecture: produces the per-target descriptors
/// and the sub-parser instance bound to them.
pub trait TargetBackend: Send + Sync {
    /// Architecture name this backend serves, e.g. `x86_64`. Triples are
    /// matched against it by their architecture component.
    fn arch(&self) -> &str;

    fn register_info(&self, triple: &str) -> RegisterInfo;

    fn assembler_info(&self, triple: &str) -> AssemblerInfo;

    fn instr_info(&self) -> InstrInfo;

    fn subtarget_info(&self, triple: &str, cpu: &str, features: &[String]) -> SubtargetInfo {
        SubtargetInfo {
            triple: triple.to_string(),
            cpu: cpu.to_string(),
            features: features.to_vec(),
        }
    }

    fn make_sub_parser(&self, config: SubParserConfig) -> Box<dyn AsmSubParser>;
}

/// Process-wide registry of target backends.
///
/// Concurrency contract: lookups take the read lock and may run
/// concurrently from any number of compilation threads; `register` takes
/// the write lock and must complete before dependent lookups begin
/// (register targets at startup, look them up afterwards). Nothing else in
/// this subsystem locks.
#[derive(Default)]
pub struct TargetRegistry {
    backends: RwLock<IndexMap<String, Arc<dyn TargetBackend>>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, backend: Arc<dyn TargetBackend>) {
        let mut backends = self
            .backends
            .write()
            .expect("target registry lock poisoned");
        backends.insert(backend.arch().to_string(), backend);
    }

    /// Backend whose architecture matches the triple's architecture
    /// component, if one is registered.
    pub fn lookup(&self, triple: &str) -> Option<Arc<dyn TargetBackend>> {
        let backends = self
            .backends
            .read()
            .expect("target registry lock poisoned");
        backends.get(arch_of_triple(triple)).cloned()
    }

    /// Registered architecture names, in registration order.
    pub fn registered_archs(&self) -> Vec<String> {
        let backends = self
            .backends
            .read()
            .expect("target registry lock poisoned");
        backends.keys().cloned().collect()
    }
}

/// Architecture component of a target triple: the text before the first
/// `-`, or the whole string when there is none.
fn arch_of_triple(triple: &str) -> &str {
    triple.split('-').next().unwrap_or(triple)
}

/// CPU identifier of the machine the compiler is running on.
pub fn host_cpu() -> String {
    std::env::consts::ARCH.to_string()
}

/// Feature strings detected on the host CPU. Platforms report features in
/// no particular order, so the result is sorted to keep subtarget
/// construction deterministic.
pub fn host_features() -> Vec<String> {
    let mut features = Vec::new();

    #[cfg(target_arch = "x86_64")]
    {
        for (name, detected) in [
            ("sse2", is_x86_feature_detected!("sse2")),
            ("sse4.1", is_x86_feature_detected!("sse4.1")),
            ("avx", is_x86_feature_detected!("avx")),
            ("avx2", is_x86_feature_detected!("avx2")),
        ] {
            if detected {
                features.push(format!("+{name}"));
            }
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        for (name, detected) in [
            ("neon", std::arch::is_aarch64_feature_detected!("neon")),
            ("aes", std::arch::is_aarch64_feature_detected!("aes")),
            ("sve", std::arch::is_aarch64_feature_detected!("sve")),
        ] {
            if detected {
                features.push(format!("+{name}"));
            }
        }
    }

    features.sort();
    features
}
