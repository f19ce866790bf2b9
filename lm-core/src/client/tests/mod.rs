
use assertables::*;
use httpmock::Method::*;
use lm_testutils::*;
use rstest::*;
use serde_json::json;
use tracing_test::traced_test;

use super::*;
use crate::prelude::*;
