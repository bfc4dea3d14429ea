mod test_full_pipeline;
mod test_mock_store;
