#[derive(Debug, Clone, PartialEq)]
pub enum RegError {
    SolverNotInitialized,
    TemplateNotSet,
    InvalidTemplateDimension { width: usize, height: usize },
    InvalidLevelCount(usize),
    InvalidLevelRatio(f64),
    InvalidNormalization(f64),
    LevelOutOfRange { level: usize, levels: usize },
    OutOfBoundsSample { x: f64, y: f64, width: usize, height: usize },
    DegenerateSystem,
}

impl std::fmt::Display for RegError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegError::SolverNotInitialized => {
                write!(f, "Solver not initialized: call init before set_template")
            }
            RegError::TemplateNotSet => {
                write!(f, "Template not set: call set_template before register_image")
            }
            RegError::InvalidTemplateDimension { width, height } => {
                write!(
                    f,
                    "Invalid template dimensions: {}x{} (each must be 2-4000)",
                    width, height
                )
            }
            RegError::InvalidLevelCount(levels) => {
                write!(f, "Invalid pyramid level count: {} (must be >= 1)", levels)
            }
            RegError::InvalidLevelRatio(ratio) => {
                write!(f, "Invalid level resize ratio: {} (must be in (0, 1))", ratio)
            }
            RegError::InvalidNormalization(factor) => {
                write!(f, "Invalid normalization factor: {} (must be > 0)", factor)
            }
            RegError::LevelOutOfRange { level, levels } => {
                write!(f, "Pyramid level {} out of range ({} levels)", level, levels)
            }
            RegError::OutOfBoundsSample { x, y, width, height } => {
                write!(
                    f,
                    "Sample position ({:.3}, {:.3}) outside {}x{} image (bilinear neighborhood must fit)",
                    x, y, width, height
                )
            }
            RegError::DegenerateSystem => {
                write!(f, "Gauss-Newton normal equations are not positive-definite")
            }
        }
    }
}

impl std::error::Error for RegError {}

pub type RegResult<T> = Result<T, RegError>;
