mod request_reply;
