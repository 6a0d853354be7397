// External crates
use serde::{Deserialize, Serialize};

// Internal modules
use crate::constants::*;
use crate::util::alignment::MaskPolicy;

/// Lag / rolling-window settings for the feature constructor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub source_column: String,
    pub lags: Vec<usize>,
    pub rolling_windows: Vec<usize>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            source_column: TARGET_COLUMN.to_string(),
            lags: LAGS.to_vec(),
            rolling_windows: ROLLING_WINDOWS.to_vec(),
        }
    }
}

/// Hyperparameter values searched for the tree ensembles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSearchConfig {
    pub cv_folds: usize,
    pub rf_n_trees: Vec<usize>,
    pub rf_max_depth: Vec<u16>,
    pub gb_n_estimators: Vec<usize>,
    pub gb_learning_rate: Vec<f64>,
    pub gb_max_depth: Vec<u16>,
    pub seed: u64,
}

impl Default for TreeSearchConfig {
    fn default() -> Self {
        Self {
            cv_folds: CV_FOLDS,
            rf_n_trees: RF_N_TREES.to_vec(),
            rf_max_depth: RF_MAX_DEPTH.to_vec(),
            gb_n_estimators: GB_N_ESTIMATORS.to_vec(),
            gb_learning_rate: GB_LEARNING_RATE.to_vec(),
            gb_max_depth: GB_MAX_DEPTH.to_vec(),
            seed: RANDOM_SEED,
        }
    }
}

/// Manual grid and training settings for the recurrent model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmSearchConfig {
    pub timesteps: usize,
    pub units: Vec<usize>,
    pub dropout: Vec<f64>,
    pub epochs: Vec<usize>,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub validation_split: f64,
    pub seed: u64,
}

impl Default for LstmSearchConfig {
    fn default() -> Self {
        Self {
            timesteps: SEQUENCE_LENGTH,
            units: LSTM_UNITS.to_vec(),
            dropout: LSTM_DROPOUT.to_vec(),
            epochs: LSTM_EPOCHS.to_vec(),
            learning_rate: LSTM_LEARNING_RATE,
            batch_size: LSTM_BATCH_SIZE,
            validation_split: VALIDATION_SPLIT_RATIO,
            seed: RANDOM_SEED,
        }
    }
}

/// Everything the pipeline needs besides its input paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub target: String,
    pub farm_pattern: String,
    pub mask_policy: MaskPolicy,
    pub train_ratio: f64,
    pub features: FeatureConfig,
    pub trees: TreeSearchConfig,
    pub lstm: LstmSearchConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target: TARGET_COLUMN.to_string(),
            farm_pattern: FARM_FILE_PATTERN.to_string(),
            mask_policy: MaskPolicy::default(),
            train_ratio: TRAIN_SPLIT_RATIO,
            features: FeatureConfig::default(),
            trees: TreeSearchConfig::default(),
            lstm: LstmSearchConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Single-candidate grids and short LSTM training, for smoke runs
    pub fn quick() -> Self {
        let mut config = Self::default();
        config.trees.rf_n_trees = vec![20];
        config.trees.rf_max_depth = vec![5];
        config.trees.gb_n_estimators = vec![20];
        config.trees.gb_learning_rate = vec![0.1];
        config.trees.gb_max_depth = vec![3];
        config.lstm.units = vec![16];
        config.lstm.dropout = vec![0.1];
        config.lstm.epochs = vec![3];
        config
    }

    /// Feature source follows the target column
    pub fn with_target(mut self, target: &str) -> Self {
        self.target = target.to_string();
        self.features.source_column = target.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.target, "wp1");
        assert_eq!(config.features.lags, vec![1, 2, 3]);
        assert_eq!(config.features.rolling_windows, vec![3, 6, 12]);
        assert_eq!(config.trees.cv_folds, 3);
        assert_eq!(config.lstm.timesteps, 3);
        assert!((config.train_ratio - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_with_target_moves_feature_source() {
        let config = PipelineConfig::default().with_target("wp2");
        assert_eq!(config.features.source_column, "wp2");
    }
}
