mod planner;
mod summarizer;

pub use planner::ModelPlanner;
pub use summarizer::ModelSummarizer;
