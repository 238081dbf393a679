mod test_room_retirement;
