pub mod build_info;
pub mod config;
pub mod constants;
pub mod error;
pub mod evaluation;
pub mod workflow;

pub mod util {
    pub mod alignment;
    pub mod feature_engineering;
    pub mod file_utils;
    pub mod model_logger;
    pub mod pre_processor;
    pub mod synthetic;
    #[cfg(test)]
    pub mod test_utils;
}

pub mod ensemble;

pub mod lstm {
    pub mod step_1_tensor_preparation;
    pub mod step_2_lstm_cell;
    pub mod step_3_lstm_model_arch;
    pub mod step_4_train_model;
    pub mod step_5_prediction;
}

#[cfg(test)]
pub mod test;
