mod test_offerer_flow;
mod test_start_failures;
