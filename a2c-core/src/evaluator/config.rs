//! Configuration of [`Evaluator`](super::Evaluator).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Evaluator`](super::Evaluator).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EvaluatorConfig {
    /// Budget of steps, both per pass and over all passes.
    pub max_steps: usize,

    /// Budget of episodes.
    pub n_episodes: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_steps: 4500,
            n_episodes: 50,
        }
    }
}

impl EvaluatorConfig {
    /// Sets the step budget.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Sets the episode budget.
    pub fn n_episodes(mut self, v: usize) -> Self {
        self.n_episodes = v;
        self
    }

    /// Constructs [`EvaluatorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`EvaluatorConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_evaluator_config() -> Result<()> {
        let config = EvaluatorConfig::default().max_steps(100).n_episodes(3);
        let dir = TempDir::new("evaluator_config")?;
        let path = dir.path().join("evaluator_config.yaml");

        config.save(&path)?;
        let config_ = EvaluatorConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }
}
