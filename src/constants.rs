// Key and target columns
pub const DATE_COLUMN: &str = "date";
pub const HORIZON_COLUMN: &str = "hors";
pub const TARGET_COLUMN: &str = "wp1";

// Forecast file discovery
pub const FARM_FILE_PATTERN: &str = "windforecasts_wf*.csv";
pub const FARM_SUFFIX_PREFIX: &str = "_wf";

// Feature construction
pub const LAGS: [usize; 3] = [1, 2, 3];
pub const ROLLING_WINDOWS: [usize; 3] = [3, 6, 12];
pub const CALENDAR_FEATURES: [&str; 3] = ["hour", "dayofweek", "month"];

// Alignment and split
pub const TRAIN_SPLIT_RATIO: f64 = 0.8; // 80% train, most recent 20% test
pub const ROW_INDEX_COLUMN: &str = "__row";

// Tree ensemble grid search
pub const CV_FOLDS: usize = 3;
pub const RF_N_TREES: [usize; 2] = [50, 100];
pub const RF_MAX_DEPTH: [u16; 2] = [5, 10];
pub const GB_N_ESTIMATORS: [usize; 2] = [50, 100];
pub const GB_LEARNING_RATE: [f64; 2] = [0.05, 0.1];
pub const GB_MAX_DEPTH: [u16; 2] = [3, 5];
pub const RANDOM_SEED: u64 = 42;

// Recurrent model
pub const SEQUENCE_LENGTH: usize = 3; // timesteps per LSTM sample
pub const LSTM_UNITS: [usize; 2] = [32, 64];
pub const LSTM_DROPOUT: [f64; 2] = [0.1, 0.2];
pub const LSTM_EPOCHS: [usize; 2] = [10, 20];
pub const LSTM_LEARNING_RATE: f64 = 0.001;
pub const LSTM_BATCH_SIZE: usize = 32;
pub const VALIDATION_SPLIT_RATIO: f64 = 0.2; // most recent 20% of search windows

// Report names, in comparison-table order
pub const RANDOM_FOREST_NAME: &str = "Random Forest";
pub const GRADIENT_BOOSTING_NAME: &str = "Gradient Boosting";
pub const LSTM_NAME: &str = "LSTM";
