//! Duration-balanced batch planner (spec §4.4.4).

use crate::core::types::AudioSource;

#[derive(Debug, Clone)]
pub struct BatchPlanner {
    pub work_budget_minutes: f64,
    pub hard_max_files: usize,
    pub soft_min_files: usize,
}

impl BatchPlanner {
    pub fn new(work_budget_minutes: f64, hard_max_files: usize, soft_min_files: usize) -> Self {
        Self { work_budget_minutes, hard_max_files, soft_min_files }
    }

    /// Sort longest-first, greedily pack batches until the work budget
    /// would be exceeded or the hard max is reached (spec §4.4.4).
    pub fn plan(&self, mut sources: Vec<AudioSource>) -> Vec<Vec<AudioSource>> {
        sources.sort_by(|a, b| b.estimated_minutes.partial_cmp(&a.estimated_minutes).unwrap());

        let mut batches: Vec<Vec<AudioSource>> = Vec::new();
        let mut current: Vec<AudioSource> = Vec::new();
        let mut current_minutes = 0.0;

        for source in sources {
            let would_exceed_budget = current_minutes + source.estimated_minutes > self.work_budget_minutes;
            let would_exceed_hard_max = current.len() + 1 > self.hard_max_files;

            if !current.is_empty() && (would_exceed_budget || would_exceed_hard_max) {
                batches.push(std::mem::take(&mut current));
                current_minutes = 0.0;
            }

            current_minutes += source.estimated_minutes;
            current.push(source);
        }

        if !current.is_empty() {
            batches.push(current);
        }

        let _ = self.soft_min_files; // advisory only; the planner never blocks on it
        batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn source(minutes: f64) -> AudioSource {
        let now = Utc::now();
        AudioSource::new(format!("{minutes}.mp3"), (minutes * 1024.0 * 1024.0) as u64, now, now)
    }

    #[test]
    fn test_plan_respects_work_budget() {
        let planner = BatchPlanner::new(7.0, 4, 1);
        let sources = vec![source(5.0), source(4.0), source(3.0), source(1.0)];
        let batches = planner.plan(sources);

        for batch in &batches {
            let longest = batch.iter().map(|s| s.estimated_minutes).fold(0.0, f64::max);
            let total: f64 = batch.iter().map(|s| s.estimated_minutes).sum();
            assert!(total <= 7.0 + longest + 1e-9);
        }
    }

    #[test]
    fn test_plan_respects_hard_max_files() {
        let planner = BatchPlanner::new(100.0, 2, 1);
        let sources = vec![source(1.0), source(1.0), source(1.0), source(1.0), source(1.0)];
        let batches = planner.plan(sources);
        for batch in &batches {
            assert!(batch.len() <= 2);
        }
    }

    #[test]
    fn test_plan_last_batch_may_be_under_budget() {
        let planner = BatchPlanner::new(7.0, 4, 1);
        let batches = planner.plan(vec![source(2.0)]);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
    }

    #[test]
    fn test_plan_empty_input() {
        let planner = BatchPlanner::new(7.0, 4, 1);
        assert!(planner.plan(vec![]).is_empty());
    }

    /// Property check over randomized duration vectors: no matter what
    /// durations come in, every source is placed exactly once and no
    /// batch exceeds the hard file cap.
    #[test]
    fn test_plan_randomized_durations_never_drops_or_overfills() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let planner = BatchPlanner::new(10.0, 3, 1);

        for _round in 0..200 {
            let count = rng.gen_range(0..20);
            let now = Utc::now();
            let sources: Vec<AudioSource> = (0..count)
                .map(|i| {
                    let minutes = rng.gen_range(1..=600) as f64 / 60.0;
                    AudioSource::new(format!("track-{i}.mp3"), (minutes * 1024.0 * 1024.0) as u64, now, now)
                })
                .collect();
            let input_paths: std::collections::HashSet<_> = sources.iter().map(|s| s.path.clone()).collect();

            let batches = planner.plan(sources);
            let placed: Vec<String> = batches.iter().flatten().map(|s| s.path.clone()).collect();
            let placed_paths: std::collections::HashSet<_> = placed.iter().cloned().collect();

            assert_eq!(placed.len(), count);
            assert_eq!(placed_paths, input_paths);
            for batch in &batches {
                assert!(batch.len() <= 3);
            }
        }
    }
}
