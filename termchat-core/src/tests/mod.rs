mod proptest_tests;
