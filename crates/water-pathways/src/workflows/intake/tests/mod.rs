mod common;
mod eligibility;
mod lookup;
mod routing;
