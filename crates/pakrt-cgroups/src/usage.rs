//! The reporter's view of a single container's cgroup counters, shared by the v1 and v2
//! drivers so `pakrt-container::report` doesn't need to know which version produced them.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub memory_used_bytes: i64,
    pub memory_limit_bytes: i64,
    pub cpu_usage_ns: u64,
}

impl Usage {
    pub fn new(memory_used_bytes: i64, memory_limit_bytes: i64, cpu_usage_ns: u64) -> Self {
        Self {
            memory_used_bytes,
            memory_limit_bytes,
            cpu_usage_ns,
        }
    }

    /// Memory used as a percentage of the limit, `0` when the limit is unset.
    pub fn memory_percent(&self) -> f64 {
        if self.memory_limit_bytes <= 0 {
            0.0
        } else {
            (self.memory_used_bytes as f64 / self.memory_limit_bytes as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_zero_with_no_limit() {
        let usage = Usage::new(100, 0, 0);
        assert_eq!(usage.memory_percent(), 0.0);
    }

    #[test]
    fn percent_computes_correctly() {
        let usage = Usage::new(50, 200, 0);
        assert_eq!(usage.memory_percent(), 25.0);
    }
}
