mod common;

mod machine;
