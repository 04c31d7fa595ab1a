/// Entry of the index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub desc: String,
    pub path: String,
    pub dangerous: bool,
}

impl Link {
    pub fn new(desc: &str, path: &str) -> Self {
        Self {
            desc: desc.to_owned(),
            path: path.to_owned(),
            dangerous: false,
        }
    }

    pub fn dangerous(desc: &str, path: &str) -> Self {
        Self {
            dangerous: true,
            ..Self::new(desc, path)
        }
    }
}
